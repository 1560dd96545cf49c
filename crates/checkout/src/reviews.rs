//! Product reviews, open to customers who bought the product.

use chrono::Utc;
use domain::{Actor, OrderStatus, ProductId, Review};
use serde::Deserialize;
use store::Store;

use crate::error::ReviewServiceError;

/// Review fields as submitted.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewInput {
    pub rating: u8,
    #[serde(default)]
    pub title: Option<String>,
    pub comment: String,
}

pub struct ReviewService<S> {
    store: S,
}

impl<S: Store> ReviewService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// True if the actor has a paid, shipped or delivered order containing
    /// the product.
    pub async fn can_review(
        &self,
        actor: &Actor,
        product_id: &ProductId,
    ) -> Result<bool, ReviewServiceError> {
        Ok(self
            .store
            .has_purchased(actor.user_id(), product_id, &OrderStatus::REVIEWABLE)
            .await?)
    }

    /// Stores a review. One review per user and product.
    #[tracing::instrument(skip(self, actor, input), fields(user_id = %actor.user_id()))]
    pub async fn submit(
        &self,
        actor: &Actor,
        product_id: &ProductId,
        input: ReviewInput,
    ) -> Result<Review, ReviewServiceError> {
        if self.store.product(product_id).await?.is_none() {
            return Err(ReviewServiceError::ProductNotFound(product_id.clone()));
        }
        if !self.can_review(actor, product_id).await? {
            return Err(ReviewServiceError::NotPurchased(product_id.clone()));
        }

        let review = Review::new(
            actor.user_id(),
            product_id.clone(),
            input.rating,
            input.title,
            input.comment,
            Utc::now(),
        )?;
        self.store.insert_review(&review).await?;

        metrics::counter!("reviews_submitted_total").increment(1);
        tracing::info!(rating = review.rating.value(), "review submitted");
        Ok(review)
    }

    /// Reviews of a product, newest first.
    pub async fn list(&self, product_id: &ProductId) -> Result<Vec<Review>, ReviewServiceError> {
        Ok(self.store.reviews_for_product(product_id).await?)
    }
}
