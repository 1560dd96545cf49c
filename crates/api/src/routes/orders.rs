//! Order query and lifecycle endpoints.

use std::str::FromStr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{Order, OrderItem, OrderStatus};
use serde::{Deserialize, Serialize};
use store::{SessionStore, Store};

use crate::AppState;
use crate::error::ApiError;
use crate::identity::CurrentActor;

// -- Request types --

#[derive(Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub status: OrderStatus,
    pub status_label: &'static str,
    pub shipping_address: String,
    pub items: Vec<OrderItemResponse>,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub total_cents: i64,
}

impl From<&OrderItem> for OrderItemResponse {
    fn from(item: &OrderItem) -> Self {
        Self {
            product_id: item.product_id.to_string(),
            product_name: item.product_name.clone(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price.cents(),
            total_cents: item.total().cents(),
        }
    }
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id().to_string(),
            user_id: order.user_id().to_string(),
            status: order.status(),
            status_label: order.status().label(),
            shipping_address: order.shipping_address().to_string(),
            items: order.items().iter().map(OrderItemResponse::from).collect(),
            total_cents: order.total_price().cents(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

pub(crate) fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    OrderId::from_str(id).map_err(|e| ApiError::BadRequest(format!("Invalid order ID: {e}")))
}

// -- Handlers --

/// GET /orders: the caller's orders, or every order for staff.
#[tracing::instrument(skip(state))]
pub async fn list<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<OrderResponse>>, ApiError>
where
    S: Store + Clone + 'static,
    C: SessionStore + Clone + 'static,
{
    let orders = state.orders.list(&actor).await?;
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: Store + Clone + 'static,
    C: SessionStore + Clone + 'static,
{
    let order = state.orders.get(parse_order_id(&id)?, &actor).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/cancel: cancel and return the stock.
#[tracing::instrument(skip(state))]
pub async fn cancel<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: Store + Clone + 'static,
    C: SessionStore + Clone + 'static,
{
    let order = state.orders.cancel(parse_order_id(&id)?, &actor).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/status
#[tracing::instrument(skip(state, req), fields(status = %req.status))]
pub async fn set_status<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<SetStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: Store + Clone + 'static,
    C: SessionStore + Clone + 'static,
{
    let order_id = parse_order_id(&id)?;
    let status = OrderStatus::from_str(req.status.trim())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let order = state.orders.set_status(order_id, status, &actor).await?;
    Ok(Json(OrderResponse::from(&order)))
}
