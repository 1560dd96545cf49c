use async_trait::async_trait;
use common::{OrderId, SessionId, UserId};
use domain::{Order, OrderStatus, Product, ProductId, Review};
use serde_json::Value;

use crate::Result;

/// Read-only product lookup.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Fetches one product, active or not.
    async fn product(&self, id: &ProductId) -> Result<Option<Product>>;

    /// Fetches the products that exist among `ids`, sorted by id.
    ///
    /// Unknown ids are silently left out.
    async fn products(&self, ids: &[ProductId]) -> Result<Vec<Product>>;
}

/// Durable storefront state.
///
/// All implementations must be thread-safe (Send + Sync). Reads outside a
/// [`Transaction`] only ever observe committed state.
#[async_trait]
pub trait Store: Catalog {
    /// Opens a transaction.
    async fn begin(&self) -> Result<Box<dyn Transaction>>;

    /// Fetches an order with its items.
    async fn order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Orders placed by a user, newest first.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Every order, newest first.
    async fn all_orders(&self) -> Result<Vec<Order>>;

    /// Creates or replaces a catalog product.
    async fn upsert_product(&self, product: &Product) -> Result<()>;

    /// Stores a review. Fails with `DuplicateReview` if the user already
    /// reviewed the product.
    async fn insert_review(&self, review: &Review) -> Result<()>;

    /// Reviews of a product, newest first.
    async fn reviews_for_product(&self, product_id: &ProductId) -> Result<Vec<Review>>;

    /// Returns true if one of the user's orders in one of `statuses`
    /// contains the product.
    async fn has_purchased(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        statuses: &[OrderStatus],
    ) -> Result<bool>;
}

/// A unit of work over products and orders.
///
/// Rows are locked when read through `lock_*` and stay locked until
/// [`commit`](Transaction::commit) or [`rollback`](Transaction::rollback).
/// Dropping a transaction without committing rolls it back.
///
/// To stay deadlock free, a transaction locks at most one order row first
/// and then all of its product rows in a single `lock_products` call.
#[async_trait]
pub trait Transaction: Send {
    /// Locks the given product rows in ascending id order and returns them,
    /// sorted and deduplicated.
    ///
    /// Fails with `ProductNotFound` if any id does not exist.
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Sets the stock counter of a product locked by this transaction.
    async fn write_stock(&mut self, id: &ProductId, stock: u32) -> Result<()>;

    /// Locks an order row and returns it with its items.
    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Inserts a new order and its items.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Persists the status and `updated_at` of an order that was either
    /// locked or inserted by this transaction.
    async fn update_order_status(&mut self, order: &Order) -> Result<()>;

    /// Makes every write visible and releases all locks.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discards every write and releases all locks.
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Per-session storage of opaque JSON blobs, such as the cart.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session: &SessionId, key: &str) -> Result<Option<Value>>;

    async fn save(&self, session: &SessionId, key: &str, value: Value) -> Result<()>;

    async fn remove(&self, session: &SessionId, key: &str) -> Result<()>;
}
