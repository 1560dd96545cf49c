//! Order entity and its line items.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::access::Owned;
use crate::value_objects::{Money, ProductId};

use super::{OrderError, OrderStatus};

/// A purchased product within an order.
///
/// `unit_price` is captured when the order is created and never recomputed
/// from the live catalog price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderItem {
    /// Creates a new order item.
    pub fn new(
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            quantity,
            unit_price,
        }
    }

    /// Returns `unit_price × quantity`.
    pub fn total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// A durable customer order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    status: OrderStatus,
    shipping_address: String,
    items: Vec<OrderItem>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Opens a new pending order.
    pub fn place(
        user_id: UserId,
        shipping_address: impl Into<String>,
        items: Vec<OrderItem>,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        let shipping_address = shipping_address.into().trim().to_string();
        if shipping_address.is_empty() {
            return Err(OrderError::MissingShippingAddress);
        }
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }
        if let Some(item) = items.iter().find(|item| item.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                product_id: item.product_id.to_string(),
                quantity: item.quantity,
            });
        }

        Ok(Self {
            id: OrderId::new(),
            user_id,
            status: OrderStatus::Pending,
            shipping_address,
            items,
            created_at: now,
            updated_at: now,
        })
    }

    /// Reassembles an order loaded from storage.
    pub fn from_storage(
        id: OrderId,
        user_id: UserId,
        status: OrderStatus,
        shipping_address: String,
        items: Vec<OrderItem>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            status,
            shipping_address,
            items,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn shipping_address(&self) -> &str {
        &self.shipping_address
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Sum of item totals. Derived, never stored.
    pub fn total_price(&self) -> Money {
        self.items.iter().map(OrderItem::total).sum()
    }

    /// Total units per product, keyed in lock order.
    ///
    /// Several items for the same product are merged.
    pub fn quantities_by_product(&self) -> BTreeMap<ProductId, u32> {
        let mut quantities = BTreeMap::new();
        for item in &self.items {
            let entry = quantities.entry(item.product_id.clone()).or_insert(0u32);
            *entry = entry.saturating_add(item.quantity);
        }
        quantities
    }

    /// Returns true if any item is for the given product.
    pub fn contains_product(&self, product_id: &ProductId) -> bool {
        self.items.iter().any(|item| &item.product_id == product_id)
    }

    /// Confirms a pending order once payment has been arranged.
    pub fn confirm(&mut self, status: OrderStatus, now: DateTime<Utc>) -> Result<(), OrderError> {
        if !self.status.can_confirm()
            || !matches!(status, OrderStatus::Placed | OrderStatus::Paid)
        {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: status,
            });
        }
        self.status = status;
        self.updated_at = now;
        Ok(())
    }

    /// Cancels the order. Returns the status it was canceled from.
    ///
    /// Only statuses in the cancellable allow-list qualify; otherwise nothing
    /// changes.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<OrderStatus, OrderError> {
        if !self.status.can_cancel() {
            return Err(OrderError::NotCancellable {
                status: self.status,
            });
        }
        let previous = self.status;
        self.status = OrderStatus::Canceled;
        self.updated_at = now;
        Ok(previous)
    }

    /// Administrative status change. Returns the previous status.
    ///
    /// Any known status may be chosen, except that a canceled order stays
    /// canceled. Moving to `Canceled` goes through [`Order::cancel`].
    pub fn set_status(
        &mut self,
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<OrderStatus, OrderError> {
        if status == OrderStatus::Canceled {
            return self.cancel(now);
        }
        if self.status == OrderStatus::Canceled {
            return Err(OrderError::CanceledIsFinal);
        }
        let previous = self.status;
        if previous != status {
            self.status = status;
            self.updated_at = now;
        }
        Ok(previous)
    }
}

impl Owned for Order {
    fn owner_id(&self) -> UserId {
        self.user_id
    }
}
