//! End-to-end checkout and order lifecycle tests over the in-memory store.

use std::time::Duration;

use checkout::{
    CardDetails, CardError, CartService, Channel, CheckoutCoordinator, CheckoutError,
    CheckoutRequest, InMemoryNotificationSink, NotificationKind, Notifier, OrderServiceError,
    OrderService, PaymentMethod, ReviewInput, ReviewService, ReviewServiceError,
    SimulatedPaymentService,
};
use common::{SessionId, UserId};
use chrono::Utc;
use domain::{Actor, Money, Order, OrderError, OrderItem, OrderStatus, Product, ProductId};
use store::{Catalog, InMemorySessionStore, InMemoryStore, Store};

type TestCoordinator = CheckoutCoordinator<
    InMemoryStore,
    InMemorySessionStore,
    SimulatedPaymentService,
    InMemoryNotificationSink,
>;

struct TestHarness {
    store: InMemoryStore,
    carts: CartService<InMemoryStore, InMemorySessionStore>,
    coordinator: TestCoordinator,
    orders: OrderService<InMemoryStore, InMemoryNotificationSink>,
    reviews: ReviewService<InMemoryStore>,
    sink: InMemoryNotificationSink,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_success_rate(1.0)
    }

    fn with_success_rate(success_rate: f64) -> Self {
        let store = InMemoryStore::with_products([
            Product::new("grain-mill", "Grain Mill", Money::from_cents(5999), 10),
            Product::new("hydrometer", "Hydrometer", Money::from_cents(1299), 5),
            Product::new("airlock", "Airlock", Money::from_cents(199), 20),
        ]);
        let sessions = InMemorySessionStore::new();
        let sink = InMemoryNotificationSink::new();
        let notifier = Notifier::new(sink.clone());

        Self {
            carts: CartService::new(store.clone(), sessions.clone()),
            coordinator: CheckoutCoordinator::new(
                store.clone(),
                sessions,
                SimulatedPaymentService::seeded(success_rate, 42),
                notifier.clone(),
            ),
            orders: OrderService::new(store.clone(), notifier),
            reviews: ReviewService::new(store.clone()),
            store,
            sink,
        }
    }

    async fn fill_cart(&self, session: &SessionId, items: &[(&str, u32)]) {
        for (id, quantity) in items {
            self.carts
                .add(session, &ProductId::new(*id), *quantity)
                .await
                .unwrap();
        }
    }

    async fn stock(&self, id: &str) -> u32 {
        self.store.stock_of(&ProductId::new(id)).await.unwrap()
    }

    async fn set_product(&self, id: &str, update: impl FnOnce(&mut Product)) {
        let mut product = self.store.product(&ProductId::new(id)).await.unwrap().unwrap();
        update(&mut product);
        self.store.upsert_product(&product).await.unwrap();
    }
}

fn card(number: &str) -> PaymentMethod {
    PaymentMethod::Card(CardDetails {
        number: number.to_string(),
        holder: "Jo Brewer".to_string(),
        expiry: "11/99".to_string(),
        cvv: "321".to_string(),
    })
}

fn request(payment: PaymentMethod) -> CheckoutRequest {
    CheckoutRequest {
        shipping_address: "42 Carboy Court".to_string(),
        payment,
    }
}

mod checkout_flow {
    use super::*;

    #[tokio::test]
    async fn test_cash_on_delivery_places_order() {
        let h = TestHarness::new();
        let session = SessionId::new("cod");
        let customer = Actor::customer(UserId::new());
        h.fill_cart(&session, &[("hydrometer", 2), ("airlock", 3)]).await;

        let order = h
            .coordinator
            .checkout(&session, &customer, request(PaymentMethod::CashOnDelivery))
            .await
            .unwrap();

        assert_eq!(order.status(), OrderStatus::Placed);
        assert_eq!(order.user_id(), customer.user_id());
        assert_eq!(order.items().len(), 2);
        assert_eq!(order.total_price(), Money::from_cents(2 * 1299 + 3 * 199));
        assert_eq!(h.stock("hydrometer").await, 3);
        assert_eq!(h.stock("airlock").await, 17);
        assert!(h.carts.load(&session).await.unwrap().is_empty());

        let stored = h.store.order(order.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), OrderStatus::Placed);
    }

    #[tokio::test]
    async fn test_card_checkout_is_paid() {
        let h = TestHarness::new();
        let session = SessionId::new("card");
        h.fill_cart(&session, &[("grain-mill", 1)]).await;

        let order = h
            .coordinator
            .checkout(
                &session,
                &Actor::customer(UserId::new()),
                request(card("5555 5555 5555 4444")),
            )
            .await
            .unwrap();

        assert_eq!(order.status(), OrderStatus::Paid);
        assert_eq!(h.stock("grain-mill").await, 9);
    }

    #[tokio::test]
    async fn test_declined_prefix_leaves_no_trace() {
        let h = TestHarness::new();
        let session = SessionId::new("declined");
        h.fill_cart(&session, &[("grain-mill", 2)]).await;

        let result = h
            .coordinator
            .checkout(
                &session,
                &Actor::customer(UserId::new()),
                request(card("4000000000000000")),
            )
            .await;

        assert!(matches!(result, Err(CheckoutError::PaymentFailed(_))));
        assert_eq!(h.store.order_count().await, 0);
        assert_eq!(h.stock("grain-mill").await, 10);
        assert_eq!(
            h.carts
                .quantity_of(&session, &ProductId::new("grain-mill"))
                .await
                .unwrap(),
            2
        );
        assert_eq!(h.sink.attempts().await, 0);
    }

    #[tokio::test]
    async fn test_gateway_rejection_rolls_back() {
        let h = TestHarness::with_success_rate(0.0);
        let session = SessionId::new("unlucky");
        h.fill_cart(&session, &[("airlock", 4)]).await;

        let result = h
            .coordinator
            .checkout(
                &session,
                &Actor::customer(UserId::new()),
                request(card("4242424242424242")),
            )
            .await;

        assert!(matches!(result, Err(CheckoutError::PaymentFailed(_))));
        assert_eq!(h.store.order_count().await, 0);
        assert_eq!(h.stock("airlock").await, 20);
    }

    #[tokio::test]
    async fn test_empty_cart() {
        let h = TestHarness::new();

        let result = h
            .coordinator
            .checkout(
                &SessionId::new("nothing"),
                &Actor::customer(UserId::new()),
                request(PaymentMethod::CashOnDelivery),
            )
            .await;

        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
    }

    #[tokio::test]
    async fn test_missing_address() {
        let h = TestHarness::new();
        let session = SessionId::new("no-address");
        h.fill_cart(&session, &[("airlock", 1)]).await;

        let result = h
            .coordinator
            .checkout(
                &session,
                &Actor::customer(UserId::new()),
                CheckoutRequest {
                    shipping_address: String::new(),
                    payment: PaymentMethod::CashOnDelivery,
                },
            )
            .await;

        assert!(matches!(result, Err(CheckoutError::MissingAddress)));
        assert_eq!(h.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_expired_card_mutates_nothing() {
        let h = TestHarness::new();
        let session = SessionId::new("expired");
        h.fill_cart(&session, &[("airlock", 1)]).await;

        let result = h
            .coordinator
            .checkout(
                &session,
                &Actor::customer(UserId::new()),
                request(PaymentMethod::Card(CardDetails {
                    number: "4242424242424242".to_string(),
                    holder: "Jo Brewer".to_string(),
                    expiry: "01/20".to_string(),
                    cvv: "321".to_string(),
                })),
            )
            .await;

        assert!(matches!(
            result,
            Err(CheckoutError::InvalidCard(CardError::Expired))
        ));
        assert_eq!(h.store.order_count().await, 0);
        assert_eq!(h.stock("airlock").await, 20);
    }

    #[tokio::test]
    async fn test_stock_drop_after_add_is_insufficient() {
        let h = TestHarness::new();
        let session = SessionId::new("late");
        h.fill_cart(&session, &[("airlock", 2), ("hydrometer", 4)]).await;
        h.set_product("hydrometer", |p| p.stock = 1).await;

        let result = h
            .coordinator
            .checkout(
                &session,
                &Actor::customer(UserId::new()),
                request(PaymentMethod::CashOnDelivery),
            )
            .await;

        match result {
            Err(CheckoutError::InsufficientStock {
                product_id,
                available,
                requested,
                ..
            }) => {
                assert_eq!(product_id, ProductId::new("hydrometer"));
                assert_eq!(available, 1);
                assert_eq!(requested, 4);
            }
            other => panic!("expected insufficient stock, got {other:?}"),
        }
        assert_eq!(h.store.order_count().await, 0);
        assert_eq!(h.stock("airlock").await, 20);
        assert_eq!(h.stock("hydrometer").await, 1);
    }

    #[tokio::test]
    async fn test_deactivated_product_is_unavailable() {
        let h = TestHarness::new();
        let session = SessionId::new("retired");
        h.fill_cart(&session, &[("grain-mill", 1)]).await;
        h.set_product("grain-mill", |p| p.is_active = false).await;

        let result = h
            .coordinator
            .checkout(
                &session,
                &Actor::customer(UserId::new()),
                request(PaymentMethod::CashOnDelivery),
            )
            .await;

        assert!(matches!(
            result,
            Err(CheckoutError::ProductUnavailable { .. })
        ));
        assert_eq!(h.stock("grain-mill").await, 10);
    }

    #[tokio::test]
    async fn test_concurrent_checkouts_never_oversell() {
        let h = TestHarness::new();
        let first = SessionId::new("first");
        let second = SessionId::new("second");
        h.fill_cart(&first, &[("grain-mill", 6)]).await;
        h.fill_cart(&second, &[("grain-mill", 6)]).await;
        let alice = Actor::customer(UserId::new());
        let bob = Actor::customer(UserId::new());

        let (a, b) = tokio::join!(
            h.coordinator
                .checkout(&first, &alice, request(PaymentMethod::CashOnDelivery)),
            h.coordinator
                .checkout(&second, &bob, request(PaymentMethod::CashOnDelivery)),
        );

        let outcomes = [a, b];
        let succeeded = outcomes.iter().filter(|r| r.is_ok()).count();
        let short = outcomes
            .iter()
            .filter(|r| matches!(r, Err(CheckoutError::InsufficientStock { available: 4, .. })))
            .count();
        assert_eq!(succeeded, 1);
        assert_eq!(short, 1);
        assert_eq!(h.stock("grain-mill").await, 4);
        assert_eq!(h.store.order_count().await, 1);
    }
}

mod notifications {
    use super::*;

    #[tokio::test]
    async fn test_checkout_notifies_customer_and_operator() {
        let h = TestHarness::new();
        let session = SessionId::new("notify");
        h.fill_cart(&session, &[("airlock", 2)]).await;

        let order = h
            .coordinator
            .checkout(
                &session,
                &Actor::customer(UserId::new()),
                request(PaymentMethod::CashOnDelivery),
            )
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(1), h.sink.wait_for_attempts(2))
            .await
            .unwrap();
        let delivered = h.sink.delivered().await;
        assert_eq!(delivered.len(), 2);
        assert!(delivered.iter().all(|n| n.order_id == order.id()));
        assert!(delivered.iter().any(|n| n.channel == Channel::Operator));
        assert!(matches!(
            delivered[0].kind,
            NotificationKind::OrderPlaced { total } if total == Money::from_cents(398)
        ));
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_undo_checkout() {
        let h = TestHarness::new();
        h.sink.set_fail_on_notify(true).await;
        let session = SessionId::new("mail-down");
        h.fill_cart(&session, &[("airlock", 1)]).await;

        let order = h
            .coordinator
            .checkout(
                &session,
                &Actor::customer(UserId::new()),
                request(PaymentMethod::CashOnDelivery),
            )
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(1), h.sink.wait_for_attempts(2))
            .await
            .unwrap();
        assert!(h.sink.delivered().await.is_empty());
        assert!(h.store.order(order.id()).await.unwrap().is_some());
        assert_eq!(h.stock("airlock").await, 19);
    }
}

mod lifecycle {
    use super::*;

    async fn placed_order(h: &TestHarness, customer: &Actor) -> Order {
        let session = SessionId::new(format!("s-{}", customer.user_id()));
        h.fill_cart(&session, &[("hydrometer", 3)]).await;
        h.coordinator
            .checkout(&session, customer, request(card("4242424242424242")))
            .await
            .unwrap()
    }

    /// Stores a pending order with its stock already debited.
    async fn pending_order(h: &TestHarness, customer: &Actor, items: &[(&str, u32)]) -> Order {
        let items = items
            .iter()
            .map(|(id, quantity)| OrderItem::new(*id, *id, *quantity, Money::from_cents(1299)))
            .collect();
        let order = Order::place(customer.user_id(), "42 Carboy Court", items, Utc::now()).unwrap();

        let mut tx = h.store.begin().await.unwrap();
        tx.insert_order(&order).await.unwrap();
        checkout::ledger::debit(tx.as_mut(), &order).await.unwrap();
        tx.commit().await.unwrap();
        order
    }

    #[tokio::test]
    async fn test_cancel_pending_order_restores_repeated_lines() {
        let h = TestHarness::new();
        let customer = Actor::customer(UserId::new());
        let order = pending_order(&h, &customer, &[("hydrometer", 1), ("hydrometer", 2)]).await;
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(h.stock("hydrometer").await, 2);

        let canceled = h.orders.cancel(order.id(), &customer).await.unwrap();

        assert_eq!(canceled.status(), OrderStatus::Canceled);
        let stored = h.orders.get(order.id(), &customer).await.unwrap();
        assert_eq!(stored.status(), OrderStatus::Canceled);
        assert_eq!(h.stock("hydrometer").await, 5);
    }

    #[tokio::test]
    async fn test_cancel_paid_order_restores_stock() {
        let h = TestHarness::new();
        let customer = Actor::customer(UserId::new());
        let order = placed_order(&h, &customer).await;
        assert_eq!(h.stock("hydrometer").await, 2);

        let canceled = h.orders.cancel(order.id(), &customer).await.unwrap();

        assert_eq!(canceled.status(), OrderStatus::Canceled);
        assert_eq!(h.stock("hydrometer").await, 5);
    }

    #[tokio::test]
    async fn test_delivered_order_cannot_be_canceled() {
        let h = TestHarness::new();
        let customer = Actor::customer(UserId::new());
        let staff = Actor::staff(UserId::new());
        let order = placed_order(&h, &customer).await;
        h.orders
            .set_status(order.id(), OrderStatus::Delivered, &staff)
            .await
            .unwrap();

        let result = h.orders.cancel(order.id(), &customer).await;

        assert!(matches!(
            result,
            Err(OrderServiceError::NotCancellable {
                status: OrderStatus::Delivered,
                ..
            })
        ));
        let stored = h.orders.get(order.id(), &customer).await.unwrap();
        assert_eq!(stored.status(), OrderStatus::Delivered);
        assert_eq!(h.stock("hydrometer").await, 2);
    }

    #[tokio::test]
    async fn test_canceled_is_final() {
        let h = TestHarness::new();
        let customer = Actor::customer(UserId::new());
        let staff = Actor::staff(UserId::new());
        let order = placed_order(&h, &customer).await;
        h.orders.cancel(order.id(), &customer).await.unwrap();

        let result = h
            .orders
            .set_status(order.id(), OrderStatus::Shipped, &staff)
            .await;

        assert!(matches!(
            result,
            Err(OrderServiceError::Order(OrderError::CanceledIsFinal))
        ));
        assert_eq!(h.stock("hydrometer").await, 5);
    }

    #[tokio::test]
    async fn test_status_cancel_routes_through_stock_credit() {
        let h = TestHarness::new();
        let customer = Actor::customer(UserId::new());
        let order = placed_order(&h, &customer).await;

        h.orders
            .set_status(order.id(), OrderStatus::Canceled, &Actor::staff(UserId::new()))
            .await
            .unwrap();

        assert_eq!(h.stock("hydrometer").await, 5);
    }

    #[tokio::test]
    async fn test_same_status_is_silent_noop() {
        let h = TestHarness::new();
        let customer = Actor::customer(UserId::new());
        let order = placed_order(&h, &customer).await;
        tokio::time::timeout(Duration::from_secs(1), h.sink.wait_for_attempts(2))
            .await
            .unwrap();

        let unchanged = h
            .orders
            .set_status(order.id(), OrderStatus::Paid, &customer)
            .await
            .unwrap();

        assert_eq!(unchanged.updated_at(), order.updated_at());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.sink.attempts().await, 2);
    }

    #[tokio::test]
    async fn test_stranger_is_forbidden() {
        let h = TestHarness::new();
        let customer = Actor::customer(UserId::new());
        let order = placed_order(&h, &customer).await;
        let stranger = Actor::customer(UserId::new());

        assert!(matches!(
            h.orders.cancel(order.id(), &stranger).await,
            Err(OrderServiceError::Forbidden(_))
        ));
        assert!(matches!(
            h.orders.get(order.id(), &stranger).await,
            Err(OrderServiceError::NotFound(_))
        ));
        assert_eq!(h.orders.list(&customer).await.unwrap().len(), 1);
        assert!(h.orders.list(&stranger).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_change_notifies_customer() {
        let h = TestHarness::new();
        let customer = Actor::customer(UserId::new());
        let order = placed_order(&h, &customer).await;

        h.orders
            .set_status(order.id(), OrderStatus::Shipped, &Actor::staff(UserId::new()))
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(1), h.sink.wait_for_attempts(3))
            .await
            .unwrap();
        let delivered = h.sink.delivered().await;
        let update = delivered
            .iter()
            .find(|n| matches!(n.kind, NotificationKind::StatusChanged { .. }))
            .unwrap();
        assert_eq!(update.channel, Channel::Customer);
        assert_eq!(
            update.kind,
            NotificationKind::StatusChanged {
                from: OrderStatus::Paid,
                to: OrderStatus::Shipped,
            }
        );
    }
}

mod reviews {
    use super::*;

    fn review(rating: u8) -> ReviewInput {
        ReviewInput {
            rating,
            title: None,
            comment: "Accurate to the third decimal.".to_string(),
        }
    }

    #[tokio::test]
    async fn test_paid_order_unlocks_review() {
        let h = TestHarness::new();
        let customer = Actor::customer(UserId::new());
        let hydrometer = ProductId::new("hydrometer");
        let session = SessionId::new("reviewer");
        assert!(!h.reviews.can_review(&customer, &hydrometer).await.unwrap());

        h.fill_cart(&session, &[("hydrometer", 1)]).await;
        h.coordinator
            .checkout(&session, &customer, request(card("4242424242424242")))
            .await
            .unwrap();

        assert!(h.reviews.can_review(&customer, &hydrometer).await.unwrap());
        let stored = h.reviews.submit(&customer, &hydrometer, review(5)).await.unwrap();
        assert_eq!(stored.rating.value(), 5);
        assert!(matches!(
            h.reviews.submit(&customer, &hydrometer, review(3)).await,
            Err(ReviewServiceError::AlreadyReviewed(_))
        ));
    }

    #[tokio::test]
    async fn test_canceled_order_does_not_unlock_review() {
        let h = TestHarness::new();
        let customer = Actor::customer(UserId::new());
        let session = SessionId::new("refunded");
        h.fill_cart(&session, &[("airlock", 1)]).await;
        let order = h
            .coordinator
            .checkout(&session, &customer, request(card("4242424242424242")))
            .await
            .unwrap();
        h.orders.cancel(order.id(), &customer).await.unwrap();

        let result = h
            .reviews
            .submit(&customer, &ProductId::new("airlock"), review(2))
            .await;

        assert!(matches!(result, Err(ReviewServiceError::NotPurchased(_))));
    }
}
