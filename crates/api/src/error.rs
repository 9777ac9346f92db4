//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use saga::SagaError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Saga error.
    #[error(transparent)]
    Saga(#[from] SagaError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Saga(err) => saga_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn saga_error_to_response(err: SagaError) -> (StatusCode, String) {
    match &err {
        SagaError::Validation(_) | SagaError::UnknownQuery(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        SagaError::SagaNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        SagaError::AlreadyStarted(_) | SagaError::SagaClosed(_) | SagaError::StillRunning(_) => {
            (StatusCode::CONFLICT, err.to_string())
        }
        _ => {
            tracing::error!(error = %err, "internal server error");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::SagaId;
    use saga::ValidationError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (SagaError::Validation(ValidationError::NoItems), StatusCode::BAD_REQUEST),
            (SagaError::SagaNotFound(SagaId::for_order("x")), StatusCode::NOT_FOUND),
            (SagaError::AlreadyStarted(SagaId::for_order("x")), StatusCode::CONFLICT),
            (SagaError::SagaClosed(SagaId::for_order("x")), StatusCode::CONFLICT),
            (SagaError::StillRunning(SagaId::for_order("x")), StatusCode::CONFLICT),
            (SagaError::Fulfillment("boom".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), expected);
        }
    }
}
