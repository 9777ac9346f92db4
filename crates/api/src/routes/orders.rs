//! Order submission, status lookup, and signal delivery endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::SagaId;
use saga::{OrderInput, OrderStatus, SagaCoordinator, SagaSignal};
use serde::Serialize;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub coordinator: SagaCoordinator,
}

#[derive(Serialize)]
pub struct OrderAcceptedResponse {
    pub order_id: String,
    pub saga_id: String,
    pub run_id: String,
}

/// POST /orders: Validate the order and start its saga.
///
/// Returns as soon as the saga is running; progress is read from
/// `GET /orders/{id}`.
#[tracing::instrument(skip(state, input), fields(order_id = %input.id))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(input): Json<OrderInput>,
) -> Result<(StatusCode, Json<OrderAcceptedResponse>), ApiError> {
    let order_id = input.id.clone();
    let handle = state.coordinator.start(input).await?;

    let response = OrderAcceptedResponse {
        order_id,
        saga_id: handle.saga_id().to_string(),
        run_id: handle.run_id().to_string(),
    };
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// GET /orders/{id}: The live status of the order's saga.
#[tracing::instrument(skip(state))]
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OrderStatus>, ApiError> {
    let status = state
        .coordinator
        .query_status(&SagaId::for_order(&id))
        .await?;
    Ok(Json(status))
}

/// POST /orders/{id}/signals/{name}: Deliver a signal to the order's saga.
///
/// The body is read as JSON when it parses and passed on as a raw string
/// otherwise. The saga drops payloads it cannot use, so a malformed one is
/// still accepted here whatever its content type.
#[tracing::instrument(skip(state, body))]
pub async fn signal(
    State(state): State<Arc<AppState>>,
    Path((id, name)): Path<(String, String)>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    metrics::counter!("api_signals_received_total", "signal" => name.clone()).increment(1);
    let payload = serde_json::from_slice(&body).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "signal body is not JSON");
        serde_json::Value::String(String::from_utf8_lossy(&body).into_owned())
    });
    state
        .coordinator
        .signal(&SagaId::for_order(&id), SagaSignal::new(name, payload))
        .await?;
    Ok(StatusCode::ACCEPTED)
}

/// DELETE /orders/{id}: Retire a finished saga and forget its status.
#[tracing::instrument(skip(state))]
pub async fn retire(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .coordinator
        .registry()
        .retire(&SagaId::for_order(&id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
