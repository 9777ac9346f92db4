//! Top-level orchestration: split the order, fan out fulfillments, fan in.

use std::sync::Arc;

use common::SagaId;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

use crate::activity;
use crate::compensation::{NoCompensation, ShipmentCompensation};
use crate::config::SagaConfig;
use crate::error::SagaError;
use crate::events::SagaSignal;
use crate::fulfillment_task::FulfillmentTask;
use crate::input::{OrderInput, OrderResult};
use crate::listener::ShipmentEventListener;
use crate::order_fulfillment::ACTIVITY_FULFILL_ORDER;
use crate::services::{BillingService, FulfillmentService, ShipmentService};
use crate::status::Fulfillment;
use crate::status_view::SharedStatus;

/// The collaborators a saga run calls out to.
#[derive(Clone)]
pub struct SagaServices {
    pub fulfillment: Arc<dyn FulfillmentService>,
    pub billing: Arc<dyn BillingService>,
    pub shipment: Arc<dyn ShipmentService>,
    pub compensation: Arc<dyn ShipmentCompensation>,
}

impl SagaServices {
    /// Bundles the collaborators with no shipment compensation.
    pub fn new(
        fulfillment: Arc<dyn FulfillmentService>,
        billing: Arc<dyn BillingService>,
        shipment: Arc<dyn ShipmentService>,
    ) -> Self {
        Self {
            fulfillment,
            billing,
            shipment,
            compensation: Arc::new(NoCompensation),
        }
    }

    /// Replaces the compensation hook run when a shipment fails.
    pub fn with_compensation(mut self, compensation: Arc<dyn ShipmentCompensation>) -> Self {
        self.compensation = compensation;
        self
    }
}

/// Immutable facts shared by every task of one saga run.
pub(crate) struct RunContext {
    pub(crate) saga_id: SagaId,
    pub(crate) order_id: String,
    pub(crate) customer_id: String,
    pub(crate) config: SagaConfig,
    pub(crate) services: SagaServices,
}

/// One run of the order saga over an already validated input.
pub(crate) struct OrderSaga {
    ctx: Arc<RunContext>,
    items: Vec<common::Item>,
    status: SharedStatus,
    signals: mpsc::Receiver<SagaSignal>,
}

impl OrderSaga {
    pub(crate) fn new(
        input: OrderInput,
        config: SagaConfig,
        services: SagaServices,
        status: SharedStatus,
        signals: mpsc::Receiver<SagaSignal>,
    ) -> Self {
        let ctx = RunContext {
            saga_id: input.saga_id(),
            order_id: input.id,
            customer_id: input.customer_id,
            config,
            services,
        };
        Self {
            ctx: Arc::new(ctx),
            items: input.items,
            status,
            signals,
        }
    }

    /// Drives the order to completion.
    ///
    /// Fails only when the split fails. Once fulfillments exist, the run
    /// waits for every task regardless of outcome and returns `Ok`; the
    /// per-fulfillment results live in the status record.
    #[tracing::instrument(name = "order_saga", skip(self), fields(saga_id = %self.ctx.saga_id))]
    pub(crate) async fn run(self) -> Result<OrderResult, SagaError> {
        let OrderSaga {
            ctx,
            items,
            status,
            signals,
        } = self;

        let fulfillment = ctx.services.fulfillment.clone();
        let order_id = ctx.order_id.clone();
        let plans = activity::execute(ACTIVITY_FULFILL_ORDER, &ctx.config, || {
            let fulfillment = fulfillment.clone();
            let order_id = order_id.clone();
            let items = items.clone();
            async move { fulfillment.fulfill_order(&order_id, items).await }
        })
        .await
        .map_err(SagaError::into_fulfillment)?;

        let fulfillments: Vec<Fulfillment> = plans.into_iter().map(Fulfillment::from).collect();
        tracing::info!(count = fulfillments.len(), "order split into fulfillments");
        status
            .update(|s| s.fulfillments = fulfillments.clone())
            .await;

        let mut tasks = JoinSet::new();
        for (index, f) in fulfillments.into_iter().enumerate() {
            let task = FulfillmentTask::new(index, f, ctx.clone(), status.clone());
            tasks.spawn(task.process());
        }

        let (stop, stopped) = watch::channel(false);
        let listener = tokio::spawn(
            ShipmentEventListener::new(ctx.saga_id.clone(), status.clone(), signals, stopped).run(),
        );

        let total = tasks.len();
        let mut completed = 0;
        let mut failed = 0;
        while let Some(joined) = tasks.join_next().await {
            completed += 1;
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failed += 1;
                    tracing::error!(error = %e, "fulfillment error");
                }
                Err(e) => {
                    failed += 1;
                    tracing::error!(error = %e, "fulfillment task did not finish");
                }
            }
        }
        tracing::info!(total, completed, failed, "all fulfillments finished");

        stop.send_replace(true);
        if let Err(e) = listener.await {
            tracing::warn!(error = %e, "shipment event listener did not stop cleanly");
        }

        Ok(OrderResult {
            order_id: ctx.order_id.clone(),
        })
    }
}
