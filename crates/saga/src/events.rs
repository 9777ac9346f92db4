//! Signals delivered to a running saga.

use async_trait::async_trait;
use common::{SagaId, ShipmentId};
use serde::{Deserialize, Serialize};

use crate::error::SagaError;
use crate::order_fulfillment::SHIPMENT_STATUS_UPDATED_SIGNAL;
use crate::status::ShipmentStatus;

/// An out-of-band message addressed to a saga instance.
///
/// The payload stays raw JSON until the saga consumes it, so a malformed
/// payload is the consumer's problem and never the sender's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaSignal {
    pub name: String,
    pub payload: serde_json::Value,
}

impl SagaSignal {
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// Builds a `shipment-status-updated` signal.
    pub fn shipment_status_updated(
        shipment_id: ShipmentId,
        status: ShipmentStatus,
    ) -> Result<Self, SagaError> {
        let payload = serde_json::to_value(ShipmentStatusUpdated {
            shipment_id,
            status,
        })?;
        Ok(Self::new(SHIPMENT_STATUS_UPDATED_SIGNAL, payload))
    }
}

/// Payload of the `shipment-status-updated` signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentStatusUpdated {
    pub shipment_id: ShipmentId,
    pub status: ShipmentStatus,
}

/// Delivers signals to saga instances by identity.
#[async_trait]
pub trait SignalSink: Send + Sync {
    async fn deliver(&self, saga_id: &SagaId, signal: SagaSignal) -> Result<(), SagaError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shipment_status_updated_payload() {
        let signal = SagaSignal::shipment_status_updated(
            ShipmentId::new("Shipment:f1"),
            ShipmentStatus::Dispatched,
        )
        .unwrap();

        assert_eq!(signal.name, "shipment-status-updated");
        assert_eq!(
            signal.payload,
            serde_json::json!({"shipment_id": "Shipment:f1", "status": "dispatched"})
        );
    }

    #[test]
    fn test_payload_rejects_unknown_status() {
        let parsed: Result<ShipmentStatusUpdated, _> = serde_json::from_value(
            serde_json::json!({"shipment_id": "Shipment:f1", "status": "lost"}),
        );
        assert!(parsed.is_err());
    }
}
