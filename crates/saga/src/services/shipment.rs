//! Shipment sub-process trait and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::{Item, SagaId, ShipmentId};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::SagaError;
use crate::events::{SagaSignal, SignalSink};
use crate::services::notifier::{LoggingNotifier, Notification, Notifier};
use crate::status::ShipmentStatus;

/// Input handed to a shipment sub-process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentRequest {
    pub order_id: String,
    /// The saga that receives `shipment-status-updated` signals.
    pub saga_id: SagaId,
    pub items: Vec<Item>,
}

/// Result of a shipment sub-process that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentOutcome {
    /// The courier's reference, for tracking enquiries.
    pub courier_reference: String,
}

/// Runs long-lived shipment sub-processes.
///
/// A sub-process is addressed by its shipment ID; starting the same ID again
/// must not ship twice, and returns the outcome of the existing sub-process
/// once it has one. Implementations report each real-world status change
/// to the originating saga as a `shipment-status-updated` signal.
#[async_trait]
pub trait ShipmentService: Send + Sync {
    /// Runs the shipment to completion. May take arbitrarily long.
    async fn run_shipment(
        &self,
        shipment_id: &ShipmentId,
        request: ShipmentRequest,
    ) -> Result<ShipmentOutcome, SagaError>;
}

type StoredOutcome = Option<Result<ShipmentOutcome, String>>;

struct ShipmentRecord {
    request: ShipmentRequest,
    /// `None` while the sub-process is in flight.
    outcome: watch::Sender<StoredOutcome>,
}

struct InMemoryShipmentState {
    shipments: HashMap<ShipmentId, ShipmentRecord>,
    next_id: u32,
    starts: usize,
    fail_all: bool,
    fail_ids: HashSet<ShipmentId>,
    script: Vec<ShipmentStatus>,
    step_delay: Option<Duration>,
    sink: Option<Arc<dyn SignalSink>>,
    notifier: Arc<dyn Notifier>,
}

impl Default for InMemoryShipmentState {
    fn default() -> Self {
        Self {
            shipments: HashMap::new(),
            next_id: 0,
            starts: 0,
            fail_all: false,
            fail_ids: HashSet::new(),
            script: vec![
                ShipmentStatus::Created,
                ShipmentStatus::Dispatched,
                ShipmentStatus::Delivered,
            ],
            step_delay: None,
            sink: None,
            notifier: Arc::new(LoggingNotifier),
        }
    }
}

/// In-memory shipment sub-process.
///
/// Books a courier, then walks a status script (created, dispatched,
/// delivered by default), signalling the originating saga and notifying the
/// customer at each step. While held, new sub-processes wait after booking
/// until released.
#[derive(Clone)]
pub struct InMemoryShipmentService {
    state: Arc<RwLock<InMemoryShipmentState>>,
    hold: Arc<watch::Sender<bool>>,
}

impl Default for InMemoryShipmentService {
    fn default() -> Self {
        Self {
            state: Arc::default(),
            hold: Arc::new(watch::Sender::new(false)),
        }
    }
}

impl InMemoryShipmentService {
    /// Creates a new in-memory shipment service with no signal sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes status signals through `sink`.
    pub fn set_signal_sink(&self, sink: Arc<dyn SignalSink>) {
        self.state.write().unwrap().sink = Some(sink);
    }

    /// Sends customer notifications through `notifier`.
    pub fn set_notifier(&self, notifier: Arc<dyn Notifier>) {
        self.state.write().unwrap().notifier = notifier;
    }

    /// Sets the statuses each new sub-process reports, in order.
    pub fn set_status_script(&self, script: Vec<ShipmentStatus>) {
        self.state.write().unwrap().script = script;
    }

    /// Waits this long before each scripted status.
    pub fn set_step_delay(&self, delay: Option<Duration>) {
        self.state.write().unwrap().step_delay = delay;
    }

    /// Configures every sub-process to fail after its script.
    pub fn set_fail_on_ship(&self, fail: bool) {
        self.state.write().unwrap().fail_all = fail;
    }

    /// Fails the sub-process for this shipment after its script.
    pub fn fail_for(&self, shipment_id: ShipmentId) {
        self.state.write().unwrap().fail_ids.insert(shipment_id);
    }

    /// Keeps new sub-processes in flight until [`release`](Self::release).
    pub fn hold(&self) {
        self.hold.send_replace(true);
    }

    /// Lets held sub-processes continue.
    pub fn release(&self) {
        self.hold.send_replace(false);
    }

    /// Returns the number of distinct shipments started.
    pub fn shipment_count(&self) -> usize {
        self.state.read().unwrap().shipments.len()
    }

    /// Returns how many times a start was requested, including repeats.
    pub fn start_count(&self) -> usize {
        self.state.read().unwrap().starts
    }

    /// Returns true if a shipment exists with the given ID.
    pub fn has_shipment(&self, shipment_id: &ShipmentId) -> bool {
        self.state.read().unwrap().shipments.contains_key(shipment_id)
    }

    /// Returns the request a shipment was started with.
    pub fn request_for(&self, shipment_id: &ShipmentId) -> Option<ShipmentRequest> {
        self.state
            .read()
            .unwrap()
            .shipments
            .get(shipment_id)
            .map(|r| r.request.clone())
    }

    fn finish(
        &self,
        shipment_id: &ShipmentId,
        outcome: Result<ShipmentOutcome, String>,
    ) -> Result<ShipmentOutcome, SagaError> {
        let state = self.state.read().unwrap();
        if let Some(record) = state.shipments.get(shipment_id) {
            record.outcome.send_replace(Some(outcome.clone()));
        }
        outcome.map_err(SagaError::Shipment)
    }

    /// Waits for an in-flight sub-process and returns its outcome.
    async fn attach(
        &self,
        shipment_id: &ShipmentId,
        mut outcome: watch::Receiver<StoredOutcome>,
    ) -> Result<ShipmentOutcome, SagaError> {
        tracing::debug!(%shipment_id, "attaching to running shipment");
        loop {
            let stored = outcome.borrow_and_update().clone();
            if let Some(stored) = stored {
                return stored.map_err(SagaError::Shipment);
            }
            // The record keeps the sender alive for the life of the service.
            if outcome.changed().await.is_err() {
                return Err(SagaError::Shipment(format!(
                    "shipment {shipment_id} ended without an outcome"
                )));
            }
        }
    }
}

#[async_trait]
impl ShipmentService for InMemoryShipmentService {
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn run_shipment(
        &self,
        shipment_id: &ShipmentId,
        request: ShipmentRequest,
    ) -> Result<ShipmentOutcome, SagaError> {
        let started = {
            let mut state = self.state.write().unwrap();
            state.starts += 1;

            match state.shipments.get(shipment_id) {
                Some(existing) => Err(existing.outcome.subscribe()),
                None => {
                    state.next_id += 1;
                    let courier_reference = format!("COURIER-{:04}", state.next_id);
                    state.shipments.insert(
                        shipment_id.clone(),
                        ShipmentRecord {
                            request: request.clone(),
                            outcome: watch::Sender::new(None),
                        },
                    );
                    Ok((
                        courier_reference,
                        state.fail_all || state.fail_ids.contains(shipment_id),
                        state.script.clone(),
                        state.step_delay,
                        state.sink.clone(),
                        state.notifier.clone(),
                    ))
                }
            }
        };

        let (courier_reference, fail, script, step_delay, sink, notifier) = match started {
            Ok(fresh) => fresh,
            Err(running) => return self.attach(shipment_id, running).await,
        };

        tracing::debug!(%courier_reference, "shipment booked");

        let mut hold = self.hold.subscribe();
        loop {
            if !*hold.borrow_and_update() {
                break;
            }
            // The sender lives in self, so the channel cannot close here.
            if hold.changed().await.is_err() {
                break;
            }
        }

        for status in script {
            if let Some(delay) = step_delay {
                tokio::time::sleep(delay).await;
            }

            match &sink {
                Some(sink) => {
                    let delivered =
                        match SagaSignal::shipment_status_updated(shipment_id.clone(), status) {
                            Ok(signal) => sink.deliver(&request.saga_id, signal).await,
                            Err(e) => Err(e),
                        };
                    if let Err(e) = delivered {
                        tracing::warn!(error = %e, %status, "failed to signal order saga");
                    }
                }
                None => tracing::debug!(%status, "no signal sink configured"),
            }

            let notification = Notification::for_shipment_status(&request.order_id, status);
            if let Err(e) = notifier.notify(notification).await {
                tracing::warn!(error = %e, %status, "failed to notify customer");
            }
        }

        if fail {
            return self.finish(shipment_id, Err("Carrier rejected shipment".to_string()));
        }
        self.finish(shipment_id, Ok(ShipmentOutcome { courier_reference }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::notifier::InMemoryNotifier;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<(SagaId, SagaSignal)>>,
    }

    #[async_trait]
    impl SignalSink for RecordingSink {
        async fn deliver(&self, saga_id: &SagaId, signal: SagaSignal) -> Result<(), SagaError> {
            self.delivered.lock().await.push((saga_id.clone(), signal));
            Ok(())
        }
    }

    fn request() -> ShipmentRequest {
        ShipmentRequest {
            order_id: "o1".to_string(),
            saga_id: SagaId::for_order("o1"),
            items: vec![Item::new("SKU-1", 1)],
        }
    }

    #[tokio::test]
    async fn test_run_signals_each_status() {
        let service = InMemoryShipmentService::new();
        let sink = Arc::new(RecordingSink::default());
        let notifier = InMemoryNotifier::new();
        service.set_signal_sink(sink.clone());
        service.set_notifier(Arc::new(notifier.clone()));

        let id = ShipmentId::for_fulfillment("o1:1");
        let outcome = service.run_shipment(&id, request()).await.unwrap();
        assert_eq!(outcome.courier_reference, "COURIER-0001");

        let delivered = sink.delivered.lock().await;
        assert_eq!(delivered.len(), 3);
        assert!(delivered.iter().all(|(saga, _)| saga.as_str() == "Order:o1"));
        assert_eq!(delivered[2].1.payload["status"], "delivered");
        assert_eq!(notifier.sent().len(), 3);
    }

    #[tokio::test]
    async fn test_repeat_start_returns_stored_outcome() {
        let service = InMemoryShipmentService::new();
        let id = ShipmentId::for_fulfillment("o1:1");

        let first = service.run_shipment(&id, request()).await.unwrap();
        let second = service.run_shipment(&id, request()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(service.shipment_count(), 1);
        assert_eq!(service.start_count(), 2);
    }

    #[tokio::test]
    async fn test_fail_for_shipment() {
        let service = InMemoryShipmentService::new();
        let id = ShipmentId::for_fulfillment("o1:1");
        service.fail_for(id.clone());

        let result = service.run_shipment(&id, request()).await;
        assert!(matches!(result, Err(SagaError::Shipment(_))));
        assert!(service.has_shipment(&id));

        let again = service.run_shipment(&id, request()).await;
        assert!(matches!(again, Err(SagaError::Shipment(_))));
    }

    #[tokio::test]
    async fn test_repeat_start_attaches_to_held_shipment() {
        let service = InMemoryShipmentService::new();
        service.hold();

        let runner = service.clone();
        let id = ShipmentId::for_fulfillment("o1:1");
        let task_id = id.clone();
        let handle = tokio::spawn(async move { runner.run_shipment(&task_id, request()).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());
        assert!(service.has_shipment(&id));

        let repeat = service.clone();
        let repeat_id = id.clone();
        let attached =
            tokio::spawn(async move { repeat.run_shipment(&repeat_id, request()).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!attached.is_finished());

        service.release();
        let first = handle.await.unwrap().unwrap();
        let second = attached.await.unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(service.shipment_count(), 1);
        assert_eq!(service.start_count(), 2);
    }
}
