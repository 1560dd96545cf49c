//! Order entity, line items and the status state machine.

mod model;
mod status;

pub use model::{Order, OrderItem};
pub use status::OrderStatus;

use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Shipping address is required.
    #[error("Shipping address is required")]
    MissingShippingAddress,

    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// Invalid quantity.
    #[error("Invalid quantity for {product_id}: {quantity} (must be greater than 0)")]
    InvalidQuantity { product_id: String, quantity: u32 },

    /// The order is not in a cancellable status.
    #[error("Order cannot be canceled from {status} status")]
    NotCancellable { status: OrderStatus },

    /// A canceled order never returns to an active status.
    #[error("Canceled orders cannot change status")]
    CanceledIsFinal,

    /// The order is not in the expected status.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// A status name that is not part of the lifecycle.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),
}
