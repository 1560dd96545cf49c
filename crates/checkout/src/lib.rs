//! Application services for the storefront core.
//!
//! A checkout runs in these steps:
//! 1. Validate the cart, the shipping address and any card details
//! 2. Create the order inside a store transaction
//! 3. Debit stock through the ledger, locking product rows in id order
//! 4. Take payment
//! 5. Commit, clear the cart and notify the customer and the operator
//!
//! Any failure in steps 2 to 4 rolls the whole transaction back, so neither
//! the order nor the stock debit is ever observable. Cancellation goes
//! through [`OrderService`], which credits the stock back in the same
//! transaction as the status change.

pub mod cart;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod notification;
pub mod orders;
pub mod payment;
pub mod reviews;

pub use cart::{CART_SESSION_KEY, CartService, CartSummary, CartView};
pub use coordinator::{CheckoutCoordinator, CheckoutRequest};
pub use error::{CartServiceError, CheckoutError, OrderServiceError, ReviewServiceError};
pub use ledger::LedgerError;
pub use notification::{
    Channel, InMemoryNotificationSink, LogNotificationSink, Notification, NotificationError,
    NotificationKind, NotificationSink, Notifier,
};
pub use orders::OrderService;
pub use payment::{
    CardDetails, CardError, PaymentError, PaymentMethod, PaymentReceipt, PaymentService,
    SimulatedPaymentService,
};
pub use reviews::{ReviewInput, ReviewService};
