//! HTTP API server with observability for the storefront core.
//!
//! Exposes the cart, checkout, order lifecycle and review services over
//! REST, with structured logging (tracing) and Prometheus metrics. Callers
//! identify themselves with the `x-session-id`, `x-user-id` and `x-staff`
//! headers; authentication happens upstream.

pub mod catalog;
pub mod config;
pub mod error;
pub mod identity;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use checkout::{
    CartService, CheckoutCoordinator, LogNotificationSink, Notifier, OrderService,
    ReviewService, SimulatedPaymentService,
};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{SessionStore, Store};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S, C>
where
    S: Store + Clone,
    C: SessionStore + Clone,
{
    pub catalog: S,
    pub carts: CartService<S, C>,
    pub checkout: CheckoutCoordinator<S, C, SimulatedPaymentService, LogNotificationSink>,
    pub orders: OrderService<S, LogNotificationSink>,
    pub reviews: ReviewService<S>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, C>(state: Arc<AppState<S, C>>, metrics_handle: PrometheusHandle) -> Router
where
    S: Store + Clone + 'static,
    C: SessionStore + Clone + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/products/{id}", get(routes::products::get::<S, C>))
        .route(
            "/products/{id}/reviews",
            get(routes::products::reviews::<S, C>).post(routes::products::submit_review::<S, C>),
        )
        .route(
            "/cart",
            get(routes::cart::view::<S, C>).delete(routes::cart::clear::<S, C>),
        )
        .route("/cart/items", post(routes::cart::add::<S, C>))
        .route(
            "/cart/items/{id}",
            put(routes::cart::update::<S, C>)
                .get(routes::cart::quantity::<S, C>)
                .delete(routes::cart::remove::<S, C>),
        )
        .route("/checkout", post(routes::checkout::submit::<S, C>))
        .route("/orders", get(routes::orders::list::<S, C>))
        .route("/orders/{id}", get(routes::orders::get::<S, C>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S, C>))
        .route("/orders/{id}/status", post(routes::orders::set_status::<S, C>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the services over a store, a session store and a payment simulator.
///
/// Notifications go to the log.
pub fn create_default_state<S, C>(
    store: S,
    sessions: C,
    payment: SimulatedPaymentService,
) -> Arc<AppState<S, C>>
where
    S: Store + Clone + 'static,
    C: SessionStore + Clone + 'static,
{
    let notifier = Notifier::new(LogNotificationSink);

    Arc::new(AppState {
        carts: CartService::new(store.clone(), sessions.clone()),
        checkout: CheckoutCoordinator::new(store.clone(), sessions, payment, notifier.clone()),
        orders: OrderService::new(store.clone(), notifier),
        reviews: ReviewService::new(store.clone()),
        catalog: store,
    })
}
