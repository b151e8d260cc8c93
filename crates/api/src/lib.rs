//! HTTP API server with observability for the order-fulfillment system.
//!
//! Provides REST endpoints for users, products, orders, and delivery
//! tracking, with structured logging (tracing) and Prometheus metrics.

pub mod caller;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use domain::{OrderService, ProductCatalog, UserDirectory};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/api/users", post(routes::users::register::<S>))
        .route("/api/users/admin", post(routes::users::register_admin::<S>))
        .route(
            "/api/users/admin/deliveries",
            get(routes::users::all_deliveries::<S>),
        )
        .route("/api/users/{id}/orders", get(routes::users::orders::<S>))
        .route(
            "/api/products",
            post(routes::products::create::<S>).get(routes::products::list::<S>),
        )
        .route("/api/products/{id}", get(routes::products::get::<S>))
        .route("/api/orders", post(routes::orders::place::<S>))
        .route(
            "/api/orders/{id}/delivery",
            get(routes::orders::delivery_status::<S>)
                .patch(routes::orders::update_delivery_status::<S>),
        )
        .route("/api/orders/{id}/cancel", post(routes::orders::cancel::<S>))
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

/// Creates the application state over a single shared store.
///
/// Admin registration is disabled when `admin_secret` is `None`.
pub fn create_default_state<S: Store>(store: S, admin_secret: Option<String>) -> Arc<AppState<S>> {
    let users = match admin_secret {
        Some(secret) => UserDirectory::new(store.clone()).with_admin_secret(secret),
        None => UserDirectory::new(store.clone()),
    };

    Arc::new(AppState {
        order_service: OrderService::new(store.clone()),
        catalog: ProductCatalog::new(store),
        users,
    })
}
