//! Post-purchase product reviews.

use chrono::{DateTime, Utc};
use common::UserId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::access::Owned;
use crate::value_objects::ProductId;

const MAX_TITLE_CHARS: usize = 100;

/// Validation errors for a review.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReviewError {
    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),

    #[error("Review comment is required")]
    EmptyComment,

    #[error("Review title is longer than {MAX_TITLE_CHARS} characters")]
    TitleTooLong,
}

/// Star rating from 1 to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = ReviewError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (1..=5).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ReviewError::InvalidRating(value))
        }
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

/// A user's review of a product. At most one per user and product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub product_id: ProductId,
    pub user_id: UserId,
    pub rating: Rating,
    pub title: Option<String>,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl Review {
    /// Validates and builds a review.
    ///
    /// Blank titles are stored as `None`.
    pub fn new(
        user_id: UserId,
        product_id: ProductId,
        rating: u8,
        title: Option<String>,
        comment: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, ReviewError> {
        let rating = Rating::try_from(rating)?;
        let comment = comment.into().trim().to_string();
        if comment.is_empty() {
            return Err(ReviewError::EmptyComment);
        }
        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if title
            .as_ref()
            .is_some_and(|t| t.chars().count() > MAX_TITLE_CHARS)
        {
            return Err(ReviewError::TitleTooLong);
        }

        Ok(Self {
            product_id,
            user_id,
            rating,
            title,
            comment,
            created_at: now,
        })
    }
}

impl Owned for Review {
    fn owner_id(&self) -> UserId {
        self.user_id
    }
}
