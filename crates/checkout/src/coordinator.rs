//! Checkout coordinator: turns a session cart into a confirmed order.

use std::collections::HashMap;

use chrono::Utc;
use common::SessionId;
use domain::{Actor, Order, OrderItem, ProductId};
use store::{SessionStore, Store, Transaction};

use crate::cart::CartService;
use crate::error::CheckoutError;
use crate::ledger;
use crate::notification::{NotificationSink, Notifier};
use crate::payment::{PaymentMethod, PaymentService, validate_card};

/// What the customer submits at checkout.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub shipping_address: String,
    pub payment: PaymentMethod,
}

/// Orchestrates a checkout.
///
/// Order creation, stock debit, payment and confirmation run inside one
/// store transaction. Any failure rolls all of them back, so a failed
/// checkout leaves no order behind and no stock moved.
pub struct CheckoutCoordinator<S, C, P, N>
where
    S: Store,
    C: SessionStore,
    P: PaymentService,
    N: NotificationSink,
{
    store: S,
    carts: CartService<S, C>,
    payment: P,
    notifier: Notifier<N>,
}

impl<S, C, P, N> CheckoutCoordinator<S, C, P, N>
where
    S: Store + Clone,
    C: SessionStore,
    P: PaymentService,
    N: NotificationSink,
{
    pub fn new(store: S, sessions: C, payment: P, notifier: Notifier<N>) -> Self {
        let carts = CartService::new(store.clone(), sessions);
        Self {
            store,
            carts,
            payment,
            notifier,
        }
    }

    /// Places an order for the contents of the session's cart.
    ///
    /// On success the order is `Paid` (card) or `Placed` (cash on delivery),
    /// stock has been debited and the cart is empty. On failure nothing has
    /// changed and the cart is left as it was.
    #[tracing::instrument(
        skip(self, request),
        fields(session = %session, user_id = %actor.user_id(), method = request.payment.as_str())
    )]
    pub async fn checkout(
        &self,
        session: &SessionId,
        actor: &Actor,
        request: CheckoutRequest,
    ) -> Result<Order, CheckoutError> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let start = std::time::Instant::now();

        let result = self.place_order(session, actor, request).await;

        metrics::histogram!("checkout_duration_seconds").record(start.elapsed().as_secs_f64());
        match &result {
            Ok(order) => {
                metrics::counter!("checkout_completed_total").increment(1);
                tracing::info!(order_id = %order.id(), status = %order.status(), "checkout completed");
            }
            Err(err) => {
                metrics::counter!("checkout_failed_total", "reason" => err.reason()).increment(1);
                tracing::info!(reason = err.reason(), error = %err, "checkout failed");
            }
        }
        result
    }

    async fn place_order(
        &self,
        session: &SessionId,
        actor: &Actor,
        request: CheckoutRequest,
    ) -> Result<Order, CheckoutError> {
        let cart = self.carts.load(session).await?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        if request.shipping_address.trim().is_empty() {
            return Err(CheckoutError::MissingAddress);
        }
        if let PaymentMethod::Card(card) = &request.payment {
            validate_card(card, Utc::now().date_naive())?;
        }

        let lines: Vec<_> = cart.lines().collect();
        let ids: Vec<ProductId> = lines.iter().map(|line| line.product_id.clone()).collect();
        self.ensure_available(&ids).await?;

        let items = lines
            .into_iter()
            .map(|line| OrderItem::new(line.product_id, line.name, line.quantity, line.unit_price))
            .collect();
        let mut order = Order::place(actor.user_id(), request.shipping_address, items, Utc::now())?;

        let mut tx = self.store.begin().await?;
        let outcome = self
            .reserve_and_pay(tx.as_mut(), &mut order, &request.payment)
            .await;
        match outcome {
            Ok(()) => tx.commit().await?,
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "checkout rollback failed");
                }
                return Err(err);
            }
        }

        if let Err(err) = self.carts.clear(session).await {
            tracing::warn!(order_id = %order.id(), error = %err, "failed to clear cart after checkout");
        }
        self.notifier.order_placed(&order);

        Ok(order)
    }

    /// Every product in the cart must still exist and be active.
    async fn ensure_available(&self, ids: &[ProductId]) -> Result<(), CheckoutError> {
        let products: HashMap<ProductId, bool> = self
            .store
            .products(ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p.is_active))
            .collect();

        match ids.iter().find(|id| products.get(*id) != Some(&true)) {
            Some(id) => Err(CheckoutError::ProductUnavailable {
                product_id: id.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn reserve_and_pay(
        &self,
        tx: &mut dyn Transaction,
        order: &mut Order,
        method: &PaymentMethod,
    ) -> Result<(), CheckoutError> {
        tx.insert_order(order).await?;
        ledger::debit(tx, order).await?;

        let receipt = self
            .payment
            .charge(order.id(), order.total_price(), method)
            .await
            .map_err(|e| CheckoutError::PaymentFailed(e.to_string()))?;
        tracing::debug!(payment_id = %receipt.payment_id, "payment recorded");

        order.confirm(method.confirmed_status(), Utc::now())?;
        tx.update_order_status(order).await?;
        Ok(())
    }
}
