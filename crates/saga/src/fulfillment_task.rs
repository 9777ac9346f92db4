//! Per-fulfillment subroutine: charge, then ship and wait.

use std::sync::Arc;

use common::ShipmentId;

use crate::activity;
use crate::compensation::CompensationContext;
use crate::error::SagaError;
use crate::order_fulfillment::ACTIVITY_CHARGE;
use crate::order_saga::RunContext;
use crate::services::{ChargeRequest, ChargeResult, ShipmentRequest};
use crate::status::{Fulfillment, Shipment, TaskState};
use crate::status_view::SharedStatus;

/// Processes one fulfillment. Owns writes to its index of the fulfillments list.
pub(crate) struct FulfillmentTask {
    index: usize,
    fulfillment: Fulfillment,
    ctx: Arc<RunContext>,
    status: SharedStatus,
}

impl FulfillmentTask {
    pub(crate) fn new(
        index: usize,
        fulfillment: Fulfillment,
        ctx: Arc<RunContext>,
        status: SharedStatus,
    ) -> Self {
        Self {
            index,
            fulfillment,
            ctx,
            status,
        }
    }

    /// Runs the task. A payment or shipment error ends only this fulfillment.
    #[tracing::instrument(
        name = "fulfillment_task",
        skip(self),
        fields(saga_id = %self.ctx.saga_id, fulfillment_id = %self.fulfillment.id)
    )]
    pub(crate) async fn process(self) -> Result<(), SagaError> {
        let charge = match self.charge().await {
            Ok(charge) => charge,
            Err(e) => {
                self.set_task(TaskState::PaymentFailed).await;
                tracing::warn!(error = %e, "charge failed, fulfillment abandoned");
                metrics::counter!("fulfillment_failed_total", "reason" => "payment").increment(1);
                return Err(e);
            }
        };
        self.set_task(TaskState::Charged).await;

        let shipment_id = ShipmentId::for_fulfillment(&self.fulfillment.id);
        let request = ShipmentRequest {
            order_id: self.ctx.order_id.clone(),
            saga_id: self.ctx.saga_id.clone(),
            items: self.fulfillment.items.clone(),
        };

        // Recorded before the sub-process starts so none of its status
        // signals can arrive ahead of the shipment they refer to.
        let recorded = shipment_id.clone();
        self.status
            .update(|s| {
                if let Some(f) = s.fulfillments.get_mut(self.index) {
                    f.shipment = Some(Shipment::requested(recorded));
                    f.task = TaskState::ShipmentRequested;
                }
            })
            .await;

        let shipments = self.ctx.services.shipment.clone();
        let process_id = shipment_id.clone();
        let process =
            tokio::spawn(async move { shipments.run_shipment(&process_id, request).await });
        tracing::info!(%shipment_id, invoice = %charge.invoice_reference, "shipment started");

        let result = match process.await {
            Ok(result) => result,
            Err(e) => Err(SagaError::Shipment(format!("shipment process aborted: {e}"))),
        };

        match result {
            Ok(outcome) => {
                self.set_task(TaskState::Completed).await;
                tracing::info!(%shipment_id, courier = %outcome.courier_reference, "shipment completed");
                Ok(())
            }
            Err(e) => {
                let e = e.into_shipment();
                self.set_task(TaskState::ShipmentFailed).await;
                tracing::warn!(%shipment_id, error = %e, "shipment failed");
                metrics::counter!("fulfillment_failed_total", "reason" => "shipment").increment(1);
                self.compensate(shipment_id, charge, &e).await;
                Err(e)
            }
        }
    }

    async fn charge(&self) -> Result<ChargeResult, SagaError> {
        let request = ChargeRequest {
            customer_id: self.ctx.customer_id.clone(),
            reference: self.fulfillment.id.clone(),
            items: self.fulfillment.items.clone(),
        };
        let billing = self.ctx.services.billing.clone();

        activity::execute(ACTIVITY_CHARGE, &self.ctx.config, || {
            let billing = billing.clone();
            let request = request.clone();
            async move { billing.charge(request).await }
        })
        .await
        .map_err(SagaError::into_payment)
    }

    async fn compensate(&self, shipment_id: ShipmentId, charge: ChargeResult, error: &SagaError) {
        let context = CompensationContext {
            saga_id: self.ctx.saga_id.clone(),
            order_id: self.ctx.order_id.clone(),
            customer_id: self.ctx.customer_id.clone(),
            fulfillment_id: self.fulfillment.id.clone(),
            shipment_id,
            charge,
            error: error.to_string(),
        };
        if let Err(e) = self
            .ctx
            .services
            .compensation
            .on_shipment_failed(&context)
            .await
        {
            tracing::error!(error = %e, "shipment compensation failed");
        }
    }

    async fn set_task(&self, task: TaskState) {
        let index = self.index;
        self.status
            .update(|s| {
                if let Some(f) = s.fulfillments.get_mut(index) {
                    f.task = task;
                }
            })
            .await;
    }
}
