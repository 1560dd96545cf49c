//! Service error types.

use common::OrderId;
use domain::{OrderError, OrderStatus, ProductId, ReviewError};
use store::StoreError;
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::payment::CardError;

/// Typed outcome of a failed checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Your cart is empty")]
    EmptyCart,

    #[error("Please provide shipping address")]
    MissingAddress,

    #[error("Invalid card details: {0}")]
    InvalidCard(#[from] CardError),

    /// A product in the cart no longer exists or was deactivated.
    #[error("Product {product_id} is no longer available")]
    ProductUnavailable { product_id: ProductId },

    #[error("Not enough '{product_name}'. Available: {available}, requested: {requested}")]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        available: u32,
        requested: u32,
    },

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    /// The order could not be built from the cart.
    #[error("Error placing order: {0}")]
    Order(#[from] OrderError),

    /// Anything else that went wrong while the order was being placed.
    #[error("Error placing order: {0}")]
    Unexpected(#[from] StoreError),
}

impl CheckoutError {
    /// Short label used for the `reason` metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            CheckoutError::EmptyCart => "empty_cart",
            CheckoutError::MissingAddress => "missing_address",
            CheckoutError::InvalidCard(_) => "invalid_card",
            CheckoutError::ProductUnavailable { .. } => "product_unavailable",
            CheckoutError::InsufficientStock { .. } => "insufficient_stock",
            CheckoutError::PaymentFailed(_) => "payment_failed",
            CheckoutError::Order(_) | CheckoutError::Unexpected(_) => "unexpected",
        }
    }
}

impl From<LedgerError> for CheckoutError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientStock {
                product_id,
                product_name,
                available,
                requested,
            } => CheckoutError::InsufficientStock {
                product_id,
                product_name,
                available,
                requested,
            },
            LedgerError::Store(err) => CheckoutError::Unexpected(err),
        }
    }
}

/// Errors from cart mutations made on behalf of a request.
#[derive(Debug, Error)]
pub enum CartServiceError {
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Invalid quantity {requested} for {product_id} ({available} in stock)")]
    InvalidQuantity {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    #[error("Session store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from order queries and lifecycle changes.
#[derive(Debug, Error)]
pub enum OrderServiceError {
    /// The order does not exist, or the actor may not see it.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    #[error("You do not have permission to access order {0}")]
    Forbidden(OrderId),

    #[error("Order {order_id} cannot be canceled from {status} status")]
    NotCancellable {
        order_id: OrderId,
        status: OrderStatus,
    },

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl OrderServiceError {
    pub(crate) fn from_order(order_id: OrderId, err: OrderError) -> Self {
        match err {
            OrderError::NotCancellable { status } => {
                OrderServiceError::NotCancellable { order_id, status }
            }
            other => OrderServiceError::Order(other),
        }
    }
}

/// Errors from review submission.
#[derive(Debug, Error)]
pub enum ReviewServiceError {
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("You can only review products after they have been paid for or delivered")]
    NotPurchased(ProductId),

    #[error("You have already reviewed this product")]
    AlreadyReviewed(ProductId),

    #[error(transparent)]
    Invalid(#[from] ReviewError),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ReviewServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateReview { product_id } => {
                ReviewServiceError::AlreadyReviewed(product_id)
            }
            other => ReviewServiceError::Store(other),
        }
    }
}
