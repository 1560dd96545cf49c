use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, SessionId, UserId};
use domain::{Order, OrderStatus, Product, ProductId, Review};
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    Result, StoreError,
    store::{Catalog, SessionStore, Store, Transaction},
};

/// Lazily created async mutexes, one per row key.
///
/// Entries that no transaction holds or awaits are pruned on the next
/// acquire, so the map tracks live contention rather than every key ever
/// locked.
struct RowLocks<K> {
    locks: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone> RowLocks<K> {
    fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn acquire(&self, key: &K) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Only the map owns an idle entry, and nobody can clone it while
            // the map lock is held.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(
                locks
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}

#[derive(Default)]
struct Tables {
    products: BTreeMap<ProductId, Product>,
    orders: HashMap<OrderId, Order>,
    reviews: Vec<Review>,
}

struct Shared {
    tables: RwLock<Tables>,
    product_locks: RowLocks<ProductId>,
    order_locks: RowLocks<OrderId>,
}

/// In-memory store implementation.
///
/// Committed state lives behind a single `RwLock` that is only held for the
/// duration of a read or an atomic commit. Row locks are separate per-row
/// async mutexes, so a transaction waiting for a contended product never
/// blocks readers.
#[derive(Clone)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::with_products(Vec::new())
    }

    /// Creates a store seeded with a catalog.
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let tables = Tables {
            products: products.into_iter().map(|p| (p.id.clone(), p)).collect(),
            ..Tables::default()
        };
        Self {
            shared: Arc::new(Shared {
                tables: RwLock::new(tables),
                product_locks: RowLocks::new(),
                order_locks: RowLocks::new(),
            }),
        }
    }

    /// Committed stock of a product.
    pub async fn stock_of(&self, id: &ProductId) -> Option<u32> {
        self.shared
            .tables
            .read()
            .await
            .products
            .get(id)
            .map(|p| p.stock)
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.shared.tables.read().await.orders.len()
    }
}

fn newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| b.id().cmp(&a.id()))
    });
}

#[async_trait]
impl Catalog for InMemoryStore {
    async fn product(&self, id: &ProductId) -> Result<Option<Product>> {
        Ok(self.shared.tables.read().await.products.get(id).cloned())
    }

    async fn products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();
        let tables = self.shared.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.products.get(id).cloned())
            .collect())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        Ok(Box::new(InMemoryTransaction::new(Arc::clone(&self.shared))))
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.shared.tables.read().await.orders.get(&id).cloned())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let tables = self.shared.tables.read().await;
        let mut orders: Vec<_> = tables
            .orders
            .values()
            .filter(|o| o.user_id() == user_id)
            .cloned()
            .collect();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn all_orders(&self) -> Result<Vec<Order>> {
        let mut orders: Vec<_> = self
            .shared
            .tables
            .read()
            .await
            .orders
            .values()
            .cloned()
            .collect();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn upsert_product(&self, product: &Product) -> Result<()> {
        // Serialize with in-flight stock adjustments on the same row.
        let _guard = self.shared.product_locks.acquire(&product.id).await;
        self.shared
            .tables
            .write()
            .await
            .products
            .insert(product.id.clone(), product.clone());
        Ok(())
    }

    async fn insert_review(&self, review: &Review) -> Result<()> {
        let mut tables = self.shared.tables.write().await;
        if tables
            .reviews
            .iter()
            .any(|r| r.user_id == review.user_id && r.product_id == review.product_id)
        {
            return Err(StoreError::DuplicateReview {
                product_id: review.product_id.clone(),
            });
        }
        tables.reviews.push(review.clone());
        Ok(())
    }

    async fn reviews_for_product(&self, product_id: &ProductId) -> Result<Vec<Review>> {
        let tables = self.shared.tables.read().await;
        let mut reviews: Vec<_> = tables
            .reviews
            .iter()
            .filter(|r| &r.product_id == product_id)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    async fn has_purchased(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        statuses: &[OrderStatus],
    ) -> Result<bool> {
        let tables = self.shared.tables.read().await;
        Ok(tables.orders.values().any(|o| {
            o.user_id() == user_id && statuses.contains(&o.status()) && o.contains_product(product_id)
        }))
    }
}

/// Transaction over an [`InMemoryStore`].
///
/// Writes are staged locally and applied under the table lock on commit.
/// Row guards are released when the transaction is dropped.
pub struct InMemoryTransaction {
    shared: Arc<Shared>,
    product_guards: BTreeMap<ProductId, OwnedMutexGuard<()>>,
    order_guards: HashMap<OrderId, OwnedMutexGuard<()>>,
    stock_writes: BTreeMap<ProductId, u32>,
    inserted: HashMap<OrderId, Order>,
    updated: HashMap<OrderId, Order>,
}

impl InMemoryTransaction {
    fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            product_guards: BTreeMap::new(),
            order_guards: HashMap::new(),
            stock_writes: BTreeMap::new(),
            inserted: HashMap::new(),
            updated: HashMap::new(),
        }
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();

        for id in &ids {
            if !self.product_guards.contains_key(id) {
                let guard = self.shared.product_locks.acquire(id).await;
                self.product_guards.insert(id.clone(), guard);
            }
        }

        let tables = self.shared.tables.read().await;
        ids.iter()
            .map(|id| {
                let mut product = tables
                    .products
                    .get(id)
                    .cloned()
                    .ok_or_else(|| StoreError::ProductNotFound(id.clone()))?;
                if let Some(&stock) = self.stock_writes.get(id) {
                    product.stock = stock;
                }
                Ok(product)
            })
            .collect()
    }

    async fn write_stock(&mut self, id: &ProductId, stock: u32) -> Result<()> {
        if !self.product_guards.contains_key(id) {
            return Err(StoreError::NotLocked {
                table: "products",
                key: id.to_string(),
            });
        }
        self.stock_writes.insert(id.clone(), stock);
        Ok(())
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        if let Some(order) = self.inserted.get(&id) {
            return Ok(Some(order.clone()));
        }
        if !self.order_guards.contains_key(&id) {
            let guard = self.shared.order_locks.acquire(&id).await;
            self.order_guards.insert(id, guard);
        }
        if let Some(order) = self.updated.get(&id) {
            return Ok(Some(order.clone()));
        }
        Ok(self.shared.tables.read().await.orders.get(&id).cloned())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        self.inserted.insert(order.id(), order.clone());
        Ok(())
    }

    async fn update_order_status(&mut self, order: &Order) -> Result<()> {
        let id = order.id();
        if let Some(staged) = self.inserted.get_mut(&id) {
            *staged = order.clone();
            return Ok(());
        }
        if !self.order_guards.contains_key(&id) {
            return Err(StoreError::NotLocked {
                table: "orders",
                key: id.to_string(),
            });
        }
        self.updated.insert(id, order.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        let shared = Arc::clone(&this.shared);
        let mut tables = shared.tables.write().await;

        // Validate everything first so a failed commit applies nothing.
        if let Some(id) = this
            .stock_writes
            .keys()
            .find(|id| !tables.products.contains_key(*id))
        {
            return Err(StoreError::ProductNotFound(id.clone()));
        }
        if let Some(id) = this
            .updated
            .keys()
            .find(|id| !tables.orders.contains_key(*id))
        {
            return Err(StoreError::OrderNotFound(*id));
        }

        tracing::debug!(
            stock_writes = this.stock_writes.len(),
            inserted = this.inserted.len(),
            updated = this.updated.len(),
            "committing in-memory transaction"
        );

        for (id, stock) in this.stock_writes {
            if let Some(product) = tables.products.get_mut(&id) {
                product.stock = stock;
            }
        }
        tables.orders.extend(this.inserted);
        tables.orders.extend(this.updated);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        tracing::debug!(
            locked_products = self.product_guards.len(),
            "rolling back in-memory transaction"
        );
        Ok(())
    }
}

/// In-memory session blobs.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    blobs: Arc<RwLock<HashMap<(SessionId, String), Value>>>,
}

impl InMemorySessionStore {
    /// Creates an empty session store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session: &SessionId, key: &str) -> Result<Option<Value>> {
        Ok(self
            .blobs
            .read()
            .await
            .get(&(session.clone(), key.to_string()))
            .cloned())
    }

    async fn save(&self, session: &SessionId, key: &str, value: Value) -> Result<()> {
        self.blobs
            .write()
            .await
            .insert((session.clone(), key.to_string()), value);
        Ok(())
    }

    async fn remove(&self, session: &SessionId, key: &str) -> Result<()> {
        self.blobs
            .write()
            .await
            .remove(&(session.clone(), key.to_string()));
        Ok(())
    }
}
