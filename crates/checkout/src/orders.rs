//! Order queries and lifecycle changes after checkout.

use chrono::Utc;
use common::OrderId;
use domain::{Actor, Order, OrderStatus};
use store::{Store, Transaction};

use crate::error::OrderServiceError;
use crate::ledger;
use crate::notification::{NotificationSink, Notifier};

type Result<T> = std::result::Result<T, OrderServiceError>;

/// Reads, cancels and advances orders on behalf of an actor.
///
/// Customers see and change only their own orders; staff see all of them.
pub struct OrderService<S, N> {
    store: S,
    notifier: Notifier<N>,
}

impl<S, N> OrderService<S, N>
where
    S: Store,
    N: NotificationSink,
{
    pub fn new(store: S, notifier: Notifier<N>) -> Self {
        Self { store, notifier }
    }

    /// Loads an order the actor may see.
    pub async fn get(&self, order_id: OrderId, actor: &Actor) -> Result<Order> {
        self.store
            .order(order_id)
            .await?
            .filter(|order| actor.can_modify(order))
            .ok_or(OrderServiceError::NotFound(order_id))
    }

    /// Orders visible to the actor, newest first.
    pub async fn list(&self, actor: &Actor) -> Result<Vec<Order>> {
        let orders = if actor.is_staff() {
            self.store.all_orders().await?
        } else {
            self.store.orders_for_user(actor.user_id()).await?
        };
        Ok(orders)
    }

    /// Cancels an order and returns its stock.
    ///
    /// Only `Pending`, `Placed` and `Paid` orders can be canceled. The status
    /// change and the stock credit commit together.
    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.user_id()))]
    pub async fn cancel(&self, order_id: OrderId, actor: &Actor) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let outcome = Self::cancel_in(tx.as_mut(), order_id, actor).await;
        let (order, previous) = match outcome {
            Ok(done) => done,
            Err(err) => {
                rollback(tx).await;
                return Err(err);
            }
        };
        tx.commit().await?;

        metrics::counter!("orders_canceled_total").increment(1);
        tracing::info!(from = %previous, "order canceled");
        self.notifier.status_changed(&order, previous);
        Ok(order)
    }

    async fn cancel_in(
        tx: &mut dyn Transaction,
        order_id: OrderId,
        actor: &Actor,
    ) -> Result<(Order, OrderStatus)> {
        let mut order = lock_for(tx, order_id, actor).await?;
        let previous = order
            .cancel(Utc::now())
            .map_err(|e| OrderServiceError::from_order(order_id, e))?;
        tx.update_order_status(&order).await?;
        ledger::credit(tx, &order).await?;
        Ok((order, previous))
    }

    /// Moves an order to `status`.
    ///
    /// Setting `Canceled` goes through [`cancel`](Self::cancel) so stock is
    /// returned. Setting the current status changes nothing and notifies
    /// nobody. A canceled order stays canceled.
    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.user_id()))]
    pub async fn set_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        actor: &Actor,
    ) -> Result<Order> {
        if status == OrderStatus::Canceled {
            return self.cancel(order_id, actor).await;
        }

        let mut tx = self.store.begin().await?;
        let locked = lock_for(tx.as_mut(), order_id, actor).await;
        let mut order = match locked {
            Ok(order) => order,
            Err(err) => {
                rollback(tx).await;
                return Err(err);
            }
        };

        if order.status() == status {
            rollback(tx).await;
            return Ok(order);
        }

        let previous = match order.set_status(status, Utc::now()) {
            Ok(previous) => previous,
            Err(err) => {
                rollback(tx).await;
                return Err(OrderServiceError::from_order(order_id, err));
            }
        };
        if let Err(err) = tx.update_order_status(&order).await {
            rollback(tx).await;
            return Err(err.into());
        }
        tx.commit().await?;

        metrics::counter!("order_status_changes_total", "to" => status.as_str()).increment(1);
        tracing::info!(from = %previous, to = %status, "order status changed");
        self.notifier.status_changed(&order, previous);
        Ok(order)
    }
}

/// Locks the order row, checking it exists and the actor may change it.
async fn lock_for(tx: &mut dyn Transaction, order_id: OrderId, actor: &Actor) -> Result<Order> {
    let order = tx
        .lock_order(order_id)
        .await?
        .ok_or(OrderServiceError::NotFound(order_id))?;
    if !actor.can_modify(&order) {
        return Err(OrderServiceError::Forbidden(order_id));
    }
    Ok(order)
}

async fn rollback(tx: Box<dyn Transaction>) {
    if let Err(err) = tx.rollback().await {
        tracing::error!(error = %err, "rollback failed");
    }
}
