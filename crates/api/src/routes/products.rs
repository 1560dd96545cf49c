//! Catalog lookups and product reviews.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use checkout::ReviewInput;
use domain::{Product, ProductId, Review};
use serde::Serialize;
use store::{SessionStore, Store};

use crate::AppState;
use crate::error::ApiError;
use crate::identity::CurrentActor;

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub price_cents: i64,
    pub stock: u32,
    pub available: bool,
    pub image: Option<String>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            available: product.is_available(),
            id: product.id.to_string(),
            name: product.name,
            price_cents: product.price.cents(),
            stock: product.stock,
            image: product.image,
        }
    }
}

#[derive(Serialize)]
pub struct ReviewResponse {
    pub user_id: String,
    pub rating: u8,
    pub title: Option<String>,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl From<Review> for ReviewResponse {
    fn from(review: Review) -> Self {
        Self {
            user_id: review.user_id.to_string(),
            rating: review.rating.value(),
            title: review.title,
            comment: review.comment,
            created_at: review.created_at,
        }
    }
}

/// GET /products/{id}: active products only.
pub async fn get<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError>
where
    S: Store + Clone + 'static,
    C: SessionStore + Clone + 'static,
{
    let product = state
        .catalog
        .product(&ProductId::new(id.as_str()))
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| ApiError::NotFound(format!("Product not found: {id}")))?;
    Ok(Json(product.into()))
}

/// GET /products/{id}/reviews: newest first.
pub async fn reviews<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ReviewResponse>>, ApiError>
where
    S: Store + Clone + 'static,
    C: SessionStore + Clone + 'static,
{
    let reviews = state.reviews.list(&ProductId::new(id)).await?;
    Ok(Json(reviews.into_iter().map(ReviewResponse::from).collect()))
}

/// POST /products/{id}/reviews
#[tracing::instrument(skip(state, input))]
pub async fn submit_review<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(input): Json<ReviewInput>,
) -> Result<(StatusCode, Json<ReviewResponse>), ApiError>
where
    S: Store + Clone + 'static,
    C: SessionStore + Clone + 'static,
{
    let review = state
        .reviews
        .submit(&actor, &ProductId::new(id), input)
        .await?;
    Ok((StatusCode::CREATED, Json(review.into())))
}
