//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container and need a Docker daemon, so
//! they are ignored by default. Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::{SessionId, UserId};
use domain::{Money, Order, OrderItem, OrderStatus, Product, ProductId, Review};
use serial_test::serial;
use sqlx::PgPool;
use store::{Catalog, PostgresSessionStore, PostgresStore, SessionStore, Store, StoreError};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_storefront_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Fresh pool with cleared tables
async fn get_test_pool() -> PgPool {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE reviews, order_items, orders, products, sessions")
        .execute(&pool)
        .await
        .unwrap();

    pool
}

async fn seeded_store(products: &[(&str, u32)]) -> PostgresStore {
    let store = PostgresStore::new(get_test_pool().await);
    for (id, stock) in products {
        store
            .upsert_product(&Product::new(
                *id,
                format!("Product {id}"),
                Money::from_cents(1250),
                *stock,
            ))
            .await
            .unwrap();
    }
    store
}

fn pid(id: &str) -> ProductId {
    ProductId::new(id)
}

fn order_for(user_id: UserId, items: &[(&str, u32)]) -> Order {
    Order::place(
        user_id,
        "12 Fermenter Street",
        items
            .iter()
            .map(|(id, qty)| OrderItem::new(*id, format!("Product {id}"), *qty, Money::from_cents(1250)))
            .collect(),
        Utc::now(),
    )
    .unwrap()
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn products_round_trip() {
    let store = seeded_store(&[("b", 3), ("a", 7)]).await;

    let product = store.product(&pid("a")).await.unwrap().unwrap();
    assert_eq!(product.stock, 7);
    assert_eq!(product.price, Money::from_cents(1250));
    assert!(product.is_active);

    let products = store
        .products(&[pid("b"), pid("missing"), pid("a")])
        .await
        .unwrap();
    let ids: Vec<_> = products.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn committed_order_is_loaded_with_items() {
    let store = seeded_store(&[("a", 10), ("b", 10)]).await;
    let user = UserId::new();
    let order = order_for(user, &[("a", 2), ("b", 1)]);

    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&order).await.unwrap();
    let locked = tx.lock_products(&[pid("b"), pid("a")]).await.unwrap();
    assert_eq!(locked.len(), 2);
    tx.write_stock(&pid("a"), 8).await.unwrap();
    tx.write_stock(&pid("b"), 9).await.unwrap();
    tx.commit().await.unwrap();

    let loaded = store.order(order.id()).await.unwrap().unwrap();
    assert_eq!(loaded.items().len(), 2);
    assert_eq!(loaded.total_price(), Money::from_cents(3750));
    assert_eq!(loaded.status(), OrderStatus::Pending);
    assert_eq!(store.orders_for_user(user).await.unwrap().len(), 1);
    assert_eq!(store.product(&pid("a")).await.unwrap().unwrap().stock, 8);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn rollback_leaves_no_order_and_no_stock_change() {
    let store = seeded_store(&[("a", 10)]).await;
    let order = order_for(UserId::new(), &[("a", 4)]);

    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&order).await.unwrap();
    tx.lock_products(&[pid("a")]).await.unwrap();
    tx.write_stock(&pid("a"), 6).await.unwrap();
    tx.rollback().await.unwrap();

    assert!(store.order(order.id()).await.unwrap().is_none());
    assert_eq!(store.product(&pid("a")).await.unwrap().unwrap().stock, 10);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn lock_products_reports_missing_product() {
    let store = seeded_store(&[("a", 10)]).await;

    let mut tx = store.begin().await.unwrap();
    let result = tx.lock_products(&[pid("a"), pid("ghost")]).await;

    assert!(matches!(result, Err(StoreError::ProductNotFound(id)) if id == pid("ghost")));
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn negative_stock_is_rejected_by_the_database() {
    let store = seeded_store(&[("a", 1)]).await;

    let result = sqlx::query("UPDATE products SET stock = -1 WHERE id = 'a'")
        .execute(store.pool())
        .await;

    assert!(result.is_err());
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn contended_product_row_blocks_second_transaction() {
    let store = seeded_store(&[("a", 10)]).await;

    let mut first = store.begin().await.unwrap();
    first.lock_products(&[pid("a")]).await.unwrap();
    first.write_stock(&pid("a"), 4).await.unwrap();

    let other = store.clone();
    let waiter = tokio::spawn(async move {
        let mut second = other.begin().await.unwrap();
        let products = second.lock_products(&[pid("a")]).await.unwrap();
        products[0].stock
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!waiter.is_finished());

    first.commit().await.unwrap();
    assert_eq!(waiter.await.unwrap(), 4);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn order_status_update_and_purchase_lookup() {
    let store = seeded_store(&[("a", 10)]).await;
    let user = UserId::new();
    let mut order = order_for(user, &[("a", 1)]);

    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&order).await.unwrap();
    order.confirm(OrderStatus::Paid, Utc::now()).unwrap();
    tx.update_order_status(&order).await.unwrap();
    tx.commit().await.unwrap();

    assert!(
        store
            .has_purchased(user, &pid("a"), &OrderStatus::REVIEWABLE)
            .await
            .unwrap()
    );

    let mut tx = store.begin().await.unwrap();
    let mut locked = tx.lock_order(order.id()).await.unwrap().unwrap();
    locked.cancel(Utc::now()).unwrap();
    tx.update_order_status(&locked).await.unwrap();
    tx.commit().await.unwrap();

    let stored = store.order(order.id()).await.unwrap().unwrap();
    assert_eq!(stored.status(), OrderStatus::Canceled);
    assert!(
        !store
            .has_purchased(user, &pid("a"), &OrderStatus::REVIEWABLE)
            .await
            .unwrap()
    );
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn duplicate_review_maps_to_typed_error() {
    let store = seeded_store(&[("a", 10)]).await;
    let review = Review::new(UserId::new(), pid("a"), 4, Some("Good".into()), "Tasty", Utc::now())
        .unwrap();

    store.insert_review(&review).await.unwrap();
    let result = store.insert_review(&review).await;

    assert!(matches!(result, Err(StoreError::DuplicateReview { .. })));
    let reviews = store.reviews_for_product(&pid("a")).await.unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].rating.value(), 4);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn session_blobs_round_trip() {
    let sessions = PostgresSessionStore::new(get_test_pool().await);
    let session = SessionId::new("abc");

    sessions
        .save(&session, "cart", serde_json::json!({"a": {"quantity": 2}}))
        .await
        .unwrap();
    sessions
        .save(&session, "cart", serde_json::json!({"a": {"quantity": 3}}))
        .await
        .unwrap();

    let blob = sessions.load(&session, "cart").await.unwrap().unwrap();
    assert_eq!(blob["a"]["quantity"], 3);

    sessions.remove(&session, "cart").await.unwrap();
    assert!(sessions.load(&session, "cart").await.unwrap().is_none());
}
