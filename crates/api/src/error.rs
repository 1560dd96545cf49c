//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::{CartServiceError, CheckoutError, OrderServiceError, ReviewServiceError};
use domain::OrderError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// No identity headers on a request that needs them.
    Unauthorized(String),
    Cart(CartServiceError),
    Checkout(CheckoutError),
    Order(OrderServiceError),
    Review(ReviewServiceError),
    Store(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Cart(err) => cart_error_to_response(err),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Order(err) => order_error_to_response(err),
            ApiError::Review(err) => review_error_to_response(err),
            ApiError::Store(err) => internal(err.to_string()),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn internal(msg: String) -> (StatusCode, String) {
    tracing::error!(error = %msg, "internal server error");
    (StatusCode::INTERNAL_SERVER_ERROR, msg)
}

fn cart_error_to_response(err: CartServiceError) -> (StatusCode, String) {
    match &err {
        CartServiceError::ProductNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        CartServiceError::InvalidQuantity { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
        CartServiceError::Store(_) => internal(err.to_string()),
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    match &err {
        CheckoutError::EmptyCart
        | CheckoutError::MissingAddress
        | CheckoutError::InvalidCard(_)
        | CheckoutError::Order(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        CheckoutError::ProductUnavailable { .. } | CheckoutError::InsufficientStock { .. } => {
            (StatusCode::CONFLICT, err.to_string())
        }
        CheckoutError::PaymentFailed(_) => (StatusCode::PAYMENT_REQUIRED, err.to_string()),
        CheckoutError::Unexpected(_) => internal(err.to_string()),
    }
}

fn order_error_to_response(err: OrderServiceError) -> (StatusCode, String) {
    match &err {
        OrderServiceError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        OrderServiceError::Forbidden(_) => (StatusCode::FORBIDDEN, err.to_string()),
        OrderServiceError::NotCancellable { .. }
        | OrderServiceError::Order(OrderError::CanceledIsFinal)
        | OrderServiceError::Order(OrderError::InvalidTransition { .. }) => {
            (StatusCode::CONFLICT, err.to_string())
        }
        OrderServiceError::Order(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        OrderServiceError::Store(_) => internal(err.to_string()),
    }
}

fn review_error_to_response(err: ReviewServiceError) -> (StatusCode, String) {
    match &err {
        ReviewServiceError::ProductNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        ReviewServiceError::NotPurchased(_) => (StatusCode::FORBIDDEN, err.to_string()),
        ReviewServiceError::AlreadyReviewed(_) => (StatusCode::CONFLICT, err.to_string()),
        ReviewServiceError::Invalid(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        ReviewServiceError::Store(_) => internal(err.to_string()),
    }
}

impl From<CartServiceError> for ApiError {
    fn from(err: CartServiceError) -> Self {
        ApiError::Cart(err)
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<OrderServiceError> for ApiError {
    fn from(err: OrderServiceError) -> Self {
        ApiError::Order(err)
    }
}

impl From<ReviewServiceError> for ApiError {
    fn from(err: ReviewServiceError) -> Self {
        ApiError::Review(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}
