use common::OrderId;
use domain::ProductId;
use thiserror::Error;

/// Errors that can occur when reading or writing storefront state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A product referenced by a write does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// An order referenced by a write does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// A row was written without first being locked in the transaction.
    #[error("{table} row {key} is not locked by this transaction")]
    NotLocked { table: &'static str, key: String },

    /// The user already reviewed this product.
    #[error("Product {product_id} has already been reviewed by this user")]
    DuplicateReview { product_id: ProductId },

    /// A stored value could not be mapped back into the domain model.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
