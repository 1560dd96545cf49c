//! Domain layer for the storefront.
//!
//! This crate holds the pure model, free of I/O:
//! - `Money` and `ProductId` value objects and the catalog `Product` view
//! - the session-scoped `Cart`, which self-heals rather than failing
//! - `Order`/`OrderItem` with the `OrderStatus` lifecycle rules
//! - the `Owned` capability and `Actor` permission check
//! - post-purchase `Review`s

pub mod access;
pub mod cart;
pub mod order;
pub mod product;
pub mod review;
pub mod value_objects;

pub use access::{Actor, Owned};
pub use cart::{Cart, CartLine, CartLineView};
pub use order::{Order, OrderError, OrderItem, OrderStatus};
pub use product::Product;
pub use review::{Rating, Review, ReviewError};
pub use value_objects::{Money, ProductId};
