//! Catalog seeding from a JSON file.

use std::path::Path;

use domain::Product;
use store::{Store, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid catalog file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Parses a JSON array of products.
pub fn parse(json: &str) -> Result<Vec<Product>, CatalogError> {
    Ok(serde_json::from_str(json)?)
}

/// Reads and parses a catalog file.
pub async fn load(path: impl AsRef<Path>) -> Result<Vec<Product>, CatalogError> {
    let json = tokio::fs::read_to_string(path).await?;
    parse(&json)
}

/// Inserts or replaces every product. Returns how many were written.
pub async fn seed<S: Store>(store: &S, products: &[Product]) -> Result<usize, CatalogError> {
    for product in products {
        store.upsert_product(product).await?;
    }
    tracing::info!(count = products.len(), "catalog seeded");
    Ok(products.len())
}
