//! Read-only catalog view of a product.

use serde::{Deserialize, Serialize};

use crate::value_objects::{Money, ProductId};

/// A catalog product as seen by the cart and checkout.
///
/// `stock` is only ever changed by the stock ledger under a row lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: u32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub image: Option<String>,
}

fn default_active() -> bool {
    true
}

impl Product {
    /// Creates an active product without an image.
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Money, stock: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            stock,
            is_active: true,
            image: None,
        }
    }

    /// Returns true if the product can currently be bought.
    pub fn is_available(&self) -> bool {
        self.is_active && self.stock > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_defaults_active_and_no_image() {
        let product: Product = serde_json::from_str(
            r#"{"id": "cascade-hops", "name": "Cascade Hops", "price": 499, "stock": 12}"#,
        )
        .unwrap();
        assert!(product.is_active);
        assert_eq!(product.image, None);
        assert_eq!(product.price, Money::from_cents(499));
    }

    #[test]
    fn test_out_of_stock_is_unavailable() {
        let mut product = Product::new("p1", "Pale Malt", Money::from_cents(250), 0);
        assert!(!product.is_available());
        product.stock = 3;
        assert!(product.is_available());
        product.is_active = false;
        assert!(!product.is_available());
    }
}
