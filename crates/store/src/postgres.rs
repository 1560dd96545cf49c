use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, SessionId, UserId};
use domain::{Money, Order, OrderItem, OrderStatus, Product, ProductId, Rating, Review};
use serde_json::Value;
use sqlx::{PgConnection, PgPool, Postgres, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{Catalog, SessionStore, Store, Transaction},
};

const PRODUCT_COLUMNS: &str = "id, name, price_cents, stock, is_active, image";
const ORDER_COLUMNS: &str = "id, user_id, status, shipping_address, created_at, updated_at";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn to_u32(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} out of range: {value}")))
}

fn row_to_product(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::new(row.try_get::<String, _>("id")?),
        name: row.try_get("name")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        stock: to_u32(row.try_get("stock")?, "stock")?,
        is_active: row.try_get("is_active")?,
        image: row.try_get("image")?,
    })
}

fn row_to_review(row: &PgRow) -> Result<Review> {
    let rating: i16 = row.try_get("rating")?;
    let rating = u8::try_from(rating)
        .ok()
        .and_then(|r| Rating::try_from(r).ok())
        .ok_or_else(|| StoreError::Corrupt(format!("rating out of range: {rating}")))?;
    Ok(Review {
        product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        rating,
        title: row.try_get("title")?,
        comment: row.try_get("comment")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

/// Loads the orders returned by `query` (which must select `ORDER_COLUMNS`) with
/// their items, preserving the row order of the query.
async fn fetch_orders<'q>(
    conn: &mut PgConnection,
    query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
) -> Result<Vec<Order>> {
    let rows = query.fetch_all(&mut *conn).await?;
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = rows
        .iter()
        .map(|row| row.try_get::<Uuid, _>("id"))
        .collect::<std::result::Result<_, _>>()?;

    let item_rows = sqlx::query(
        r#"
        SELECT order_id, product_id, product_name, quantity, unit_price_cents
        FROM order_items
        WHERE order_id = ANY($1)
        ORDER BY id ASC
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut items: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for row in &item_rows {
        let order_id: Uuid = row.try_get("order_id")?;
        items.entry(order_id).or_default().push(OrderItem::new(
            row.try_get::<String, _>("product_id")?,
            row.try_get::<String, _>("product_name")?,
            to_u32(row.try_get("quantity")?, "quantity")?,
            Money::from_cents(row.try_get("unit_price_cents")?),
        ));
    }

    rows.iter()
        .map(|row| {
            let id: Uuid = row.try_get("id")?;
            let status: String = row.try_get("status")?;
            let status: OrderStatus = status
                .parse()
                .map_err(|_| StoreError::Corrupt(format!("unknown order status {status}")))?;
            Ok(Order::from_storage(
                OrderId::from_uuid(id),
                UserId::from_uuid(row.try_get("user_id")?),
                status,
                row.try_get("shipping_address")?,
                items.remove(&id).unwrap_or_default(),
                row.try_get("created_at")?,
                row.try_get("updated_at")?,
            ))
        })
        .collect()
}

#[async_trait]
impl Catalog for PostgresStore {
    async fn product(&self, id: &ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let ids: Vec<&str> = ids.iter().map(ProductId::as_str).collect();
        let rows = sqlx::query(&format!(
            r#"SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) ORDER BY id COLLATE "C""#
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_product).collect()
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction { tx }))
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let orders = fetch_orders(&mut conn, sqlx::query(&sql).bind(id.as_uuid())).await?;
        Ok(orders.into_iter().next())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        );
        fetch_orders(&mut conn, sqlx::query(&sql).bind(user_id.as_uuid())).await
    }

    async fn all_orders(&self) -> Result<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC");
        fetch_orders(&mut conn, sqlx::query(&sql)).await
    }

    async fn upsert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, stock, is_active, image)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                stock = EXCLUDED.stock,
                is_active = EXCLUDED.is_active,
                image = EXCLUDED.image
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(i64::from(product.stock))
        .bind(product.is_active)
        .bind(&product.image)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_review(&self, review: &Review) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reviews (product_id, user_id, rating, title, comment, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(review.product_id.as_str())
        .bind(review.user_id.as_uuid())
        .bind(i16::from(review.rating.value()))
        .bind(&review.title)
        .bind(&review.comment)
        .bind(review.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::DuplicateReview {
                    product_id: review.product_id.clone(),
                };
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn reviews_for_product(&self, product_id: &ProductId) -> Result<Vec<Review>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, user_id, rating, title, comment, created_at
            FROM reviews
            WHERE product_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(product_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_review).collect()
    }

    async fn has_purchased(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        statuses: &[OrderStatus],
    ) -> Result<bool> {
        let statuses: Vec<&str> = statuses.iter().map(OrderStatus::as_str).collect();
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM orders o
                JOIN order_items i ON i.order_id = o.id
                WHERE o.user_id = $1 AND i.product_id = $2 AND o.status = ANY($3)
            )
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(product_id.as_str())
        .bind(&statuses)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}

/// Transaction over a [`PostgresStore`], using `SELECT ... FOR UPDATE` row
/// locks.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let mut ids: Vec<&str> = ids.iter().map(ProductId::as_str).collect();
        ids.sort_unstable();
        ids.dedup();

        // Byte-wise collation so the lock order matches `ProductId`'s `Ord`.
        let rows = sqlx::query(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE id = ANY($1)
            ORDER BY id COLLATE "C"
            FOR UPDATE
            "#
        ))
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await?;

        let products = rows
            .iter()
            .map(row_to_product)
            .collect::<Result<Vec<_>>>()?;

        if let Some(missing) = ids
            .iter()
            .find(|id| !products.iter().any(|p| p.id.as_str() == **id))
        {
            return Err(StoreError::ProductNotFound(ProductId::new(*missing)));
        }

        Ok(products)
    }

    async fn write_stock(&mut self, id: &ProductId, stock: u32) -> Result<()> {
        let result = sqlx::query("UPDATE products SET stock = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(i64::from(stock))
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ProductNotFound(id.clone()));
        }
        Ok(())
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE");
        let orders = fetch_orders(&mut self.tx, sqlx::query(&sql).bind(id.as_uuid())).await?;
        Ok(orders.into_iter().next())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, status, shipping_address, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.user_id().as_uuid())
        .bind(order.status().as_str())
        .bind(order.shipping_address())
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&mut *self.tx)
        .await?;

        for item in order.items() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, product_name, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order.id().as_uuid())
            .bind(item.product_id.as_str())
            .bind(&item.product_name)
            .bind(i64::from(item.quantity))
            .bind(item.unit_price.cents())
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn update_order_status(&mut self, order: &Order) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(order.id().as_uuid())
            .bind(order.status().as_str())
            .bind(order.updated_at())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::OrderNotFound(order.id()));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// Session blobs stored as JSONB rows keyed by session and key.
#[derive(Clone)]
pub struct PostgresSessionStore {
    pool: PgPool,
}

impl PostgresSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    async fn load(&self, session: &SessionId, key: &str) -> Result<Option<Value>> {
        let value: Option<Value> = sqlx::query_scalar(
            "SELECT data FROM sessions WHERE session_key = $1 AND data_key = $2",
        )
        .bind(session.as_str())
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }

    async fn save(&self, session: &SessionId, key: &str, value: Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (session_key, data_key, data, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (session_key, data_key) DO UPDATE SET
                data = EXCLUDED.data,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(session.as_str())
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, session: &SessionId, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE session_key = $1 AND data_key = $2")
            .bind(session.as_str())
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
