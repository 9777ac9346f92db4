//! Hosts order saga runs: validation, registration, spawning, and lookup.

use std::time::Instant;

use common::{RunId, SagaId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::SagaConfig;
use crate::error::SagaError;
use crate::events::SagaSignal;
use crate::input::{OrderInput, OrderResult};
use crate::order_saga::{OrderSaga, SagaServices};
use crate::registry::SagaRegistry;
use crate::status::OrderStatus;
use crate::status_view::SharedStatus;

/// A started saga run.
#[derive(Debug)]
pub struct SagaHandle {
    saga_id: SagaId,
    run_id: RunId,
    join: JoinHandle<Result<OrderResult, SagaError>>,
}

impl SagaHandle {
    pub fn saga_id(&self) -> &SagaId {
        &self.saga_id
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Returns true once the run has returned.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the run to finish. Dropping the handle instead leaves the
    /// run going in the background.
    pub async fn result(self) -> Result<OrderResult, SagaError> {
        self.join
            .await
            .map_err(|e| SagaError::Aborted(e.to_string()))?
    }
}

/// Starts and addresses order fulfillment sagas.
///
/// Each run splits its order, charges and ships every fulfillment
/// concurrently, and keeps a live status record that can be queried and
/// updated by shipment signals while the run is in flight.
#[derive(Clone)]
pub struct SagaCoordinator {
    services: SagaServices,
    config: SagaConfig,
    registry: SagaRegistry,
}

impl SagaCoordinator {
    /// Creates a new saga coordinator.
    pub fn new(services: SagaServices, config: SagaConfig, registry: SagaRegistry) -> Self {
        Self {
            services,
            config,
            registry,
        }
    }

    pub fn registry(&self) -> &SagaRegistry {
        &self.registry
    }

    /// Validates the order and starts its saga in the background.
    ///
    /// An invalid order fails here with no side effects: nothing is
    /// registered and no collaborator is called.
    #[tracing::instrument(skip(self, input), fields(order_id = %input.id, saga_type = crate::order_fulfillment::SAGA_TYPE))]
    pub async fn start(&self, input: OrderInput) -> Result<SagaHandle, SagaError> {
        if let Err(e) = input.validate() {
            metrics::counter!("saga_rejected_total").increment(1);
            tracing::info!(error = %e, "order rejected");
            return Err(e.into());
        }

        let saga_id = input.saga_id();
        let run_id = RunId::new();
        let status = SharedStatus::new(OrderStatus::new(&input));
        let (signals_tx, signals_rx) = mpsc::channel(self.config.signal_buffer);
        self.registry
            .register(saga_id.clone(), run_id, status.view(), signals_tx)
            .await?;

        metrics::counter!("saga_started_total").increment(1);
        tracing::info!(%saga_id, %run_id, "saga started");

        let saga = OrderSaga::new(
            input,
            self.config.clone(),
            self.services.clone(),
            status,
            signals_rx,
        );
        let registry = self.registry.clone();
        let closing_id = saga_id.clone();
        let join = tokio::spawn(async move {
            let started = Instant::now();
            // A panicking collaborator unwinds only the inner task; the run
            // is still closed and counted as failed.
            let result = match tokio::spawn(saga.run()).await {
                Ok(result) => result,
                Err(e) => Err(SagaError::Aborted(e.to_string())),
            };
            registry.close(&closing_id, run_id).await;

            let duration = started.elapsed().as_secs_f64();
            metrics::histogram!("saga_duration_seconds").record(duration);
            match &result {
                Ok(_) => {
                    metrics::counter!("saga_completed_total").increment(1);
                    tracing::info!(saga_id = %closing_id, duration, "saga completed");
                }
                Err(e) => {
                    metrics::counter!("saga_failed_total").increment(1);
                    tracing::warn!(saga_id = %closing_id, error = %e, "saga failed");
                }
            }
            result
        });

        Ok(SagaHandle {
            saga_id,
            run_id,
            join,
        })
    }

    /// Starts the saga and waits for it to finish.
    pub async fn execute(&self, input: OrderInput) -> Result<OrderResult, SagaError> {
        self.start(input).await?.result().await
    }

    /// Returns the live status of a saga.
    pub async fn query_status(&self, saga_id: &SagaId) -> Result<OrderStatus, SagaError> {
        self.registry.status(saga_id).await
    }

    /// Delivers a signal to a running saga.
    pub async fn signal(&self, saga_id: &SagaId, signal: SagaSignal) -> Result<(), SagaError> {
        self.registry.signal(saga_id, signal).await
    }
}
