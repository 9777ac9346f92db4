//! HTTP adapter for the order fulfillment saga.
//!
//! Accepts orders, serves the live status query, and delivers signals,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{
    InMemoryBillingService, InMemoryFulfillmentService, InMemoryShipmentService, LoggingNotifier,
    SagaConfig, SagaCoordinator, SagaRegistry, SagaServices,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::ops::health))
        .route("/orders", post(routes::orders::create))
        .route(
            "/orders/{id}",
            get(routes::orders::status).delete(routes::orders::retire),
        )
        .route("/orders/{id}/signals/{name}", post(routes::orders::signal))
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

/// Creates application state backed by the in-memory collaborators.
///
/// The shipment simulation reports status changes back through the same
/// registry the HTTP handlers query.
pub fn create_default_state(config: SagaConfig) -> Arc<AppState> {
    let registry = SagaRegistry::new();

    let shipment = InMemoryShipmentService::new();
    shipment.set_signal_sink(Arc::new(registry.clone()));
    shipment.set_notifier(Arc::new(LoggingNotifier));

    let services = SagaServices::new(
        Arc::new(InMemoryFulfillmentService::new()),
        Arc::new(InMemoryBillingService::new()),
        Arc::new(shipment),
    );

    Arc::new(AppState {
        coordinator: SagaCoordinator::new(services, config, registry),
    })
}
