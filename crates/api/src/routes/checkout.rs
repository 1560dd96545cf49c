//! Checkout endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use checkout::{CardDetails, CheckoutRequest, PaymentMethod};
use serde::Deserialize;
use store::{SessionStore, Store};

use super::orders::OrderResponse;
use crate::AppState;
use crate::error::ApiError;
use crate::identity::{CurrentActor, Session};

/// Checkout form fields.
///
/// Card fields are only read when `payment_method` is `card`.
#[derive(Deserialize)]
pub struct CheckoutBody {
    #[serde(default)]
    pub shipping_address: String,
    pub payment_method: String,
    #[serde(default)]
    pub card_number: String,
    #[serde(default)]
    pub card_holder: String,
    #[serde(default)]
    pub card_expiry: String,
    #[serde(default)]
    pub card_cvv: String,
}

impl CheckoutBody {
    fn into_request(self) -> Result<CheckoutRequest, ApiError> {
        let payment = match self.payment_method.as_str() {
            "card" => PaymentMethod::Card(CardDetails {
                number: self.card_number,
                holder: self.card_holder,
                expiry: self.card_expiry,
                cvv: self.card_cvv,
            }),
            "cash_on_delivery" => PaymentMethod::CashOnDelivery,
            other => {
                return Err(ApiError::BadRequest(format!(
                    "Unknown payment method: {other}"
                )));
            }
        };
        Ok(CheckoutRequest {
            shipping_address: self.shipping_address,
            payment,
        })
    }
}

/// POST /checkout: place an order for the session's cart.
#[tracing::instrument(skip(state, body))]
pub async fn submit<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Session(session): Session,
    CurrentActor(actor): CurrentActor,
    Json(body): Json<CheckoutBody>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError>
where
    S: Store + Clone + 'static,
    C: SessionStore + Clone + 'static,
{
    let request = body.into_request()?;
    let order = state.checkout.checkout(&session, &actor, request).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}
