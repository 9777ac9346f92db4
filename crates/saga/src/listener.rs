//! Background consumer that merges shipment status signals into the order record.

use chrono::Utc;
use common::SagaId;
use tokio::sync::{mpsc, watch};

use crate::events::{SagaSignal, ShipmentStatusUpdated};
use crate::order_fulfillment::SHIPMENT_STATUS_UPDATED_SIGNAL;
use crate::status_view::SharedStatus;

/// Counts of what the listener did with the signals it received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    pub applied: usize,
    pub dropped: usize,
}

/// Applies `shipment-status-updated` signals to the order record.
///
/// Runs until the shutdown flag is raised or every signal sender is gone.
/// On shutdown, signals already buffered in the channel are applied before
/// the listener exits. Unknown signals, malformed payloads and events for
/// unknown shipments are dropped without error.
pub(crate) struct ShipmentEventListener {
    saga_id: SagaId,
    status: SharedStatus,
    signals: mpsc::Receiver<SagaSignal>,
    shutdown: watch::Receiver<bool>,
    stats: ListenerStats,
}

impl ShipmentEventListener {
    pub(crate) fn new(
        saga_id: SagaId,
        status: SharedStatus,
        signals: mpsc::Receiver<SagaSignal>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            saga_id,
            status,
            signals,
            shutdown,
            stats: ListenerStats::default(),
        }
    }

    #[tracing::instrument(name = "shipment_event_listener", skip(self), fields(saga_id = %self.saga_id))]
    pub(crate) async fn run(mut self) -> ListenerStats {
        loop {
            if *self.shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                signal = self.signals.recv() => match signal {
                    Some(signal) => self.handle(signal).await,
                    None => {
                        tracing::debug!("signal channel closed");
                        return self.stats;
                    }
                },
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        while let Ok(signal) = self.signals.try_recv() {
            self.handle(signal).await;
        }
        tracing::debug!(applied = self.stats.applied, dropped = self.stats.dropped, "listener stopped");
        self.stats
    }

    async fn handle(&mut self, signal: SagaSignal) {
        if signal.name != SHIPMENT_STATUS_UPDATED_SIGNAL {
            tracing::debug!(signal = %signal.name, "ignoring unknown signal");
            self.stats.dropped += 1;
            return;
        }

        let update: ShipmentStatusUpdated = match serde_json::from_value(signal.payload) {
            Ok(update) => update,
            Err(e) => {
                tracing::debug!(error = %e, "dropping malformed shipment status payload");
                self.stats.dropped += 1;
                return;
            }
        };

        let at = Utc::now();
        let matched = self
            .status
            .update(|s| s.apply_shipment_status(&update.shipment_id, update.status, at))
            .await;

        match matched {
            Some(index) => {
                tracing::info!(
                    shipment_id = %update.shipment_id,
                    status = %update.status,
                    fulfillment_index = index,
                    "shipment status updated"
                );
                metrics::counter!("shipment_status_updates_total", "status" => update.status.as_str())
                    .increment(1);
                self.stats.applied += 1;
            }
            None => {
                tracing::debug!(shipment_id = %update.shipment_id, "no shipment matches status update");
                self.stats.dropped += 1;
            }
        }
    }
}
