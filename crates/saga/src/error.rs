//! Saga error types.

use std::time::Duration;

use common::SagaId;
use thiserror::Error;

/// Reasons an order is rejected before the saga does anything.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("ID is required")]
    MissingId,

    #[error("CustomerID is required")]
    MissingCustomerId,

    #[error("order must contain items")]
    NoItems,
}

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The order input was rejected; no side effects happened.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Splitting the order into fulfillments failed. Fails the whole saga.
    #[error("Fulfillment error: {0}")]
    Fulfillment(String),

    /// Charging a fulfillment failed. Fails only that fulfillment.
    #[error("Payment error: {0}")]
    Payment(String),

    /// The shipment sub-process failed. Fails only that fulfillment.
    #[error("Shipment error: {0}")]
    Shipment(String),

    /// A single attempt of a bounded call ran past its deadline.
    #[error("Activity '{activity}' timed out after {timeout:?}")]
    Timeout {
        activity: &'static str,
        timeout: Duration,
    },

    /// No saga instance is registered under this identity.
    #[error("Saga not found: {0}")]
    SagaNotFound(SagaId),

    /// A saga with this identity is still running.
    #[error("Saga already started: {0}")]
    AlreadyStarted(SagaId),

    /// The saga is still running and cannot be retired.
    #[error("Saga is still running: {0}")]
    StillRunning(SagaId),

    /// The saga has finished and no longer accepts signals.
    #[error("Saga is closed: {0}")]
    SagaClosed(SagaId),

    /// The saga does not answer this query.
    #[error("Unknown query: {0}")]
    UnknownQuery(String),

    /// The saga run task was lost before producing a result.
    #[error("Saga run aborted: {0}")]
    Aborted(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SagaError {
    /// Folds a timeout or foreign error into the fulfillment category.
    pub fn into_fulfillment(self) -> Self {
        match self {
            err @ SagaError::Fulfillment(_) => err,
            other => SagaError::Fulfillment(other.to_string()),
        }
    }

    /// Folds a timeout or foreign error into the payment category.
    pub fn into_payment(self) -> Self {
        match self {
            err @ SagaError::Payment(_) => err,
            other => SagaError::Payment(other.to_string()),
        }
    }

    /// Folds a foreign error into the shipment category.
    pub fn into_shipment(self) -> Self {
        match self {
            err @ SagaError::Shipment(_) => err,
            other => SagaError::Shipment(other.to_string()),
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_folds_into_fulfillment() {
        let err = SagaError::Timeout {
            activity: "fulfill_order",
            timeout: Duration::from_secs(30),
        }
        .into_fulfillment();
        assert!(matches!(err, SagaError::Fulfillment(ref msg) if msg.contains("timed out")));
    }

    #[test]
    fn category_is_preserved() {
        let err = SagaError::Payment("declined".to_string()).into_payment();
        assert_eq!(err.to_string(), "Payment error: declined");
    }

    #[test]
    fn validation_messages() {
        let err: SagaError = ValidationError::NoItems.into();
        assert_eq!(err.to_string(), "Validation error: order must contain items");
    }
}
