//! Session cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use checkout::{CartSummary, CartView};
use domain::{CartLineView, ProductId};
use serde::{Deserialize, Serialize};
use store::{SessionStore, Store};

use crate::AppState;
use crate::error::ApiError;
use crate::identity::Session;

// -- Request types --

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    #[serde(default = "one")]
    pub quantity: u32,
    /// Replace the stored quantity instead of adding to it.
    #[serde(default, rename = "override")]
    pub override_quantity: bool,
}

fn one() -> u32 {
    1
}

#[derive(Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct SummaryResponse {
    pub line_count: u32,
    pub total_cents: i64,
    pub total: String,
}

impl From<CartSummary> for SummaryResponse {
    fn from(summary: CartSummary) -> Self {
        Self {
            line_count: summary.line_count,
            total_cents: summary.total.cents(),
            total: summary.total.to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct CartLineResponse {
    pub product_id: String,
    pub name: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub total_cents: i64,
    pub stock: u32,
}

impl From<CartLineView> for CartLineResponse {
    fn from(line: CartLineView) -> Self {
        Self {
            product_id: line.product_id.to_string(),
            name: line.name,
            image: line.image,
            quantity: line.quantity,
            unit_price_cents: line.unit_price.cents(),
            total_cents: line.total_price.cents(),
            stock: line.stock,
        }
    }
}

#[derive(Serialize)]
pub struct CartResponse {
    pub items: Vec<CartLineResponse>,
    #[serde(flatten)]
    pub summary: SummaryResponse,
}

impl From<CartView> for CartResponse {
    fn from(view: CartView) -> Self {
        Self {
            items: view.lines.into_iter().map(CartLineResponse::from).collect(),
            summary: view.summary.into(),
        }
    }
}

#[derive(Serialize)]
pub struct QuantityResponse {
    pub product_id: String,
    pub quantity: u32,
}

// -- Handlers --

/// GET /cart: cart contents with stock refreshed from the catalog.
#[tracing::instrument(skip(state))]
pub async fn view<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Session(session): Session,
) -> Result<Json<CartResponse>, ApiError>
where
    S: Store + Clone + 'static,
    C: SessionStore + Clone + 'static,
{
    let view = state.carts.view(&session).await?;
    Ok(Json(view.into()))
}

/// POST /cart/items: add a product, or set its quantity with `override`.
#[tracing::instrument(skip(state, req), fields(product_id = %req.product_id))]
pub async fn add<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Session(session): Session,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<SummaryResponse>, ApiError>
where
    S: Store + Clone + 'static,
    C: SessionStore + Clone + 'static,
{
    let product_id = ProductId::new(req.product_id);
    let summary = if req.override_quantity {
        state.carts.update(&session, &product_id, req.quantity).await?
    } else {
        state.carts.add(&session, &product_id, req.quantity).await?
    };
    Ok(Json(summary.into()))
}

/// PUT /cart/items/{id}
#[tracing::instrument(skip(state, req))]
pub async fn update<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Session(session): Session,
    Path(id): Path<String>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<SummaryResponse>, ApiError>
where
    S: Store + Clone + 'static,
    C: SessionStore + Clone + 'static,
{
    let summary = state
        .carts
        .update(&session, &ProductId::new(id), req.quantity)
        .await?;
    Ok(Json(summary.into()))
}

/// DELETE /cart/items/{id}
#[tracing::instrument(skip(state))]
pub async fn remove<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Session(session): Session,
    Path(id): Path<String>,
) -> Result<Json<SummaryResponse>, ApiError>
where
    S: Store + Clone + 'static,
    C: SessionStore + Clone + 'static,
{
    let summary = state.carts.remove(&session, &ProductId::new(id)).await?;
    Ok(Json(summary.into()))
}

/// GET /cart/items/{id}
pub async fn quantity<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Session(session): Session,
    Path(id): Path<String>,
) -> Result<Json<QuantityResponse>, ApiError>
where
    S: Store + Clone + 'static,
    C: SessionStore + Clone + 'static,
{
    let product_id = ProductId::new(id);
    let quantity = state.carts.quantity_of(&session, &product_id).await?;
    Ok(Json(QuantityResponse {
        product_id: product_id.to_string(),
        quantity,
    }))
}

/// DELETE /cart
#[tracing::instrument(skip(state))]
pub async fn clear<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Session(session): Session,
) -> Result<StatusCode, ApiError>
where
    S: Store + Clone + 'static,
    C: SessionStore + Clone + 'static,
{
    state.carts.clear(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}
