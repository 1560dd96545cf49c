//! Best-effort notifications on order events.
//!
//! Delivery happens on a detached task. A failing sink is logged and counted,
//! never reported back to the operation that triggered it.

use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, UserId};
use domain::{Money, Order, OrderStatus};
use thiserror::Error;
use tokio::sync::{Mutex, Notify};

/// Who a notification is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Customer,
    Operator,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    OrderPlaced { total: Money },
    StatusChanged { from: OrderStatus, to: OrderStatus },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub channel: Channel,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub kind: NotificationKind,
}

impl Notification {
    pub fn subject(&self) -> String {
        match (&self.kind, self.channel) {
            (NotificationKind::OrderPlaced { .. }, Channel::Customer) => {
                format!("Order Confirmation #{}", self.order_id)
            }
            (NotificationKind::OrderPlaced { .. }, Channel::Operator) => {
                format!("New Order Alert #{}", self.order_id)
            }
            (NotificationKind::StatusChanged { .. }, _) => {
                format!("Order Status Update #{}", self.order_id)
            }
        }
    }

    pub fn body(&self) -> String {
        match &self.kind {
            NotificationKind::OrderPlaced { total } => match self.channel {
                Channel::Customer => format!(
                    "Thank you for your order! We've received your order and are processing it. Total: {total}"
                ),
                Channel::Operator => format!(
                    "A new order has been placed and requires your attention. Total: {total}"
                ),
            },
            NotificationKind::StatusChanged { from, to } => format!(
                "Order #{} status changed from {} to {}. {}",
                self.order_id,
                from.label(),
                to.label(),
                status_message(*to)
            ),
        }
    }
}

fn status_message(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "We'll keep you updated on your order progress.",
        OrderStatus::Placed => {
            "Your order has been confirmed and is being prepared. You will pay when you receive your order."
        }
        OrderStatus::Paid => {
            "Your order has been paid and is being processed. We'll prepare it for shipping soon."
        }
        OrderStatus::Shipped => {
            "Your order has been shipped and is on its way to you. You should receive it soon."
        }
        OrderStatus::Delivered => "Your order has been delivered. Thank you for your purchase!",
        OrderStatus::Canceled => {
            "Your order has been canceled. If you have any questions, please contact us."
        }
    }
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Destination for notifications (mail backend, log, test recorder).
#[async_trait]
pub trait NotificationSink: Send + Sync + 'static {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationError>;
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Default)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationError> {
        tracing::info!(
            channel = ?notification.channel,
            order_id = %notification.order_id,
            user_id = %notification.user_id,
            subject = %notification.subject(),
            body = %notification.body(),
            "notification sent"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RecorderState {
    delivered: Vec<Notification>,
    attempts: usize,
    fail_on_notify: bool,
}

/// Records notifications in memory, for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationSink {
    state: Arc<Mutex<RecorderState>>,
    signal: Arc<Notify>,
}

impl InMemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the sink to fail every delivery.
    pub async fn set_fail_on_notify(&self, fail: bool) {
        self.state.lock().await.fail_on_notify = fail;
    }

    /// Notifications delivered so far.
    pub async fn delivered(&self) -> Vec<Notification> {
        self.state.lock().await.delivered.clone()
    }

    /// Number of deliveries attempted, failed ones included.
    pub async fn attempts(&self) -> usize {
        self.state.lock().await.attempts
    }

    /// Waits until at least `count` deliveries have been attempted.
    pub async fn wait_for_attempts(&self, count: usize) {
        loop {
            let notified = self.signal.notified();
            if self.attempts().await >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationError> {
        let result = {
            let mut state = self.state.lock().await;
            state.attempts += 1;
            if state.fail_on_notify {
                Err(NotificationError::Delivery("mail server unavailable".into()))
            } else {
                state.delivered.push(notification.clone());
                Ok(())
            }
        };
        self.signal.notify_waiters();
        result
    }
}

/// Fire-and-forget dispatcher in front of a [`NotificationSink`].
pub struct Notifier<N> {
    sink: Arc<N>,
}

impl<N> Clone for Notifier<N> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
        }
    }
}

impl<N: NotificationSink> Notifier<N> {
    pub fn new(sink: N) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// Announces a newly placed order to the customer and the operator.
    pub fn order_placed(&self, order: &Order) {
        let kind = NotificationKind::OrderPlaced {
            total: order.total_price(),
        };
        self.dispatch(vec![
            notification(order, Channel::Customer, kind.clone()),
            notification(order, Channel::Operator, kind),
        ]);
    }

    /// Tells the customer about a status change.
    pub fn status_changed(&self, order: &Order, from: OrderStatus) {
        let kind = NotificationKind::StatusChanged {
            from,
            to: order.status(),
        };
        self.dispatch(vec![notification(order, Channel::Customer, kind)]);
    }

    fn dispatch(&self, notifications: Vec<Notification>) {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            for notification in notifications {
                if let Err(err) = sink.notify(&notification).await {
                    metrics::counter!("notifications_failed_total").increment(1);
                    tracing::warn!(
                        order_id = %notification.order_id,
                        channel = ?notification.channel,
                        error = %err,
                        "notification failed"
                    );
                }
            }
        });
    }
}

fn notification(order: &Order, channel: Channel, kind: NotificationKind) -> Notification {
    Notification {
        channel,
        order_id: order.id(),
        user_id: order.user_id(),
        kind,
    }
}
