//! Hook invoked when a shipment fails after its fulfillment was charged.
//!
//! The saga does not refund or re-ship on its own. Operators plug a policy in
//! here; the default only records that nothing was done.

use async_trait::async_trait;
use common::{SagaId, ShipmentId};

use crate::error::SagaError;
use crate::services::ChargeResult;

/// What is known about a fulfillment whose shipment failed.
#[derive(Debug, Clone)]
pub struct CompensationContext {
    pub saga_id: SagaId,
    pub order_id: String,
    pub customer_id: String,
    pub fulfillment_id: String,
    pub shipment_id: ShipmentId,
    pub charge: ChargeResult,
    pub error: String,
}

/// Compensating action for a failed shipment.
///
/// Errors returned here are logged and otherwise ignored; the fulfillment
/// still reports its shipment error.
#[async_trait]
pub trait ShipmentCompensation: Send + Sync {
    async fn on_shipment_failed(&self, context: &CompensationContext) -> Result<(), SagaError>;
}

/// Leaves the charge in place and logs the gap.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompensation;

#[async_trait]
impl ShipmentCompensation for NoCompensation {
    async fn on_shipment_failed(&self, context: &CompensationContext) -> Result<(), SagaError> {
        tracing::warn!(
            saga_id = %context.saga_id,
            fulfillment_id = %context.fulfillment_id,
            invoice = %context.charge.invoice_reference,
            error = %context.error,
            "shipment failed after charge; no compensation configured"
        );
        metrics::counter!("shipment_uncompensated_total").increment(1);
        Ok(())
    }
}
