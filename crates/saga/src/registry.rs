//! Addressing saga instances by identity for queries and signals.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{RunId, SagaId};
use tokio::sync::{RwLock, mpsc};

use crate::error::SagaError;
use crate::events::{SagaSignal, SignalSink};
use crate::order_fulfillment::STATUS_QUERY;
use crate::status::OrderStatus;
use crate::status_view::StatusView;

struct SagaEntry {
    run_id: RunId,
    view: StatusView,
    /// `None` once the run has finished.
    signals: Option<mpsc::Sender<SagaSignal>>,
}

/// Directory of saga instances, running and finished.
///
/// A finished saga stays queryable until it is retired; it no longer
/// accepts signals.
#[derive(Clone, Default)]
pub struct SagaRegistry {
    entries: Arc<RwLock<HashMap<SagaId, SagaEntry>>>,
}

impl SagaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new run. Fails if a run with this identity is still live.
    pub(crate) async fn register(
        &self,
        saga_id: SagaId,
        run_id: RunId,
        view: StatusView,
        signals: mpsc::Sender<SagaSignal>,
    ) -> Result<(), SagaError> {
        let mut entries = self.entries.write().await;
        if entries.get(&saga_id).is_some_and(|e| e.signals.is_some()) {
            return Err(SagaError::AlreadyStarted(saga_id));
        }
        entries.insert(
            saga_id,
            SagaEntry {
                run_id,
                view,
                signals: Some(signals),
            },
        );
        Ok(())
    }

    /// Marks a run finished. A newer run under the same identity is left alone.
    pub(crate) async fn close(&self, saga_id: &SagaId, run_id: RunId) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(saga_id) {
            if entry.run_id == run_id {
                entry.signals = None;
            }
        }
    }

    /// Forgets a finished saga instance.
    ///
    /// Fails with `StillRunning` while a run is live under this identity.
    pub async fn retire(&self, saga_id: &SagaId) -> Result<(), SagaError> {
        let mut entries = self.entries.write().await;
        match entries.get(saga_id) {
            None => Err(SagaError::SagaNotFound(saga_id.clone())),
            Some(entry) if entry.signals.is_some() => {
                Err(SagaError::StillRunning(saga_id.clone()))
            }
            Some(_) => {
                entries.remove(saga_id);
                Ok(())
            }
        }
    }

    /// Returns true if the saga is registered and still running.
    pub async fn is_running(&self, saga_id: &SagaId) -> bool {
        self.entries
            .read()
            .await
            .get(saga_id)
            .is_some_and(|e| e.signals.is_some())
    }

    /// Returns the run ID of the latest run under this identity.
    pub async fn run_id(&self, saga_id: &SagaId) -> Option<RunId> {
        self.entries.read().await.get(saga_id).map(|e| e.run_id)
    }

    /// Answers the `status` query for a saga.
    pub async fn status(&self, saga_id: &SagaId) -> Result<OrderStatus, SagaError> {
        let view = self
            .entries
            .read()
            .await
            .get(saga_id)
            .map(|e| e.view.clone())
            .ok_or_else(|| SagaError::SagaNotFound(saga_id.clone()))?;
        Ok(view.snapshot().await)
    }

    /// Answers a named query with its JSON result.
    pub async fn query(&self, saga_id: &SagaId, query: &str) -> Result<serde_json::Value, SagaError> {
        if query != STATUS_QUERY {
            return Err(SagaError::UnknownQuery(query.to_string()));
        }
        let status = self.status(saga_id).await?;
        Ok(serde_json::to_value(status)?)
    }

    /// Enqueues a signal for a running saga.
    ///
    /// Waits if the saga's signal buffer is full.
    pub async fn signal(&self, saga_id: &SagaId, signal: SagaSignal) -> Result<(), SagaError> {
        let sender = {
            let entries = self.entries.read().await;
            let entry = entries
                .get(saga_id)
                .ok_or_else(|| SagaError::SagaNotFound(saga_id.clone()))?;
            entry
                .signals
                .clone()
                .ok_or_else(|| SagaError::SagaClosed(saga_id.clone()))?
        };

        sender
            .send(signal)
            .await
            .map_err(|_| SagaError::SagaClosed(saga_id.clone()))
    }
}

#[async_trait]
impl SignalSink for SagaRegistry {
    async fn deliver(&self, saga_id: &SagaId, signal: SagaSignal) -> Result<(), SagaError> {
        self.signal(saga_id, signal).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::OrderInput;
    use crate::status_view::SharedStatus;
    use common::Item;

    fn view() -> StatusView {
        let input = OrderInput::new("o1", "c1", vec![Item::new("SKU-1", 1)]);
        SharedStatus::new(OrderStatus::new(&input)).view()
    }

    #[tokio::test]
    async fn test_query_and_signal_running_saga() {
        let registry = SagaRegistry::new();
        let id = SagaId::for_order("o1");
        let (tx, mut rx) = mpsc::channel(4);
        registry.register(id.clone(), RunId::new(), view(), tx).await.unwrap();

        let status = registry.query(&id, "status").await.unwrap();
        assert_eq!(status["id"], "o1");

        registry
            .signal(&id, SagaSignal::new("ping", serde_json::json!(1)))
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().name, "ping");
    }

    #[tokio::test]
    async fn test_unknown_saga_and_query() {
        let registry = SagaRegistry::new();
        let id = SagaId::for_order("missing");

        assert!(matches!(
            registry.status(&id).await,
            Err(SagaError::SagaNotFound(_))
        ));
        assert!(matches!(
            registry.query(&id, "history").await,
            Err(SagaError::UnknownQuery(_))
        ));
        assert!(matches!(
            registry
                .signal(&id, SagaSignal::new("ping", serde_json::Value::Null))
                .await,
            Err(SagaError::SagaNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_live_saga_rejected_until_closed() {
        let registry = SagaRegistry::new();
        let id = SagaId::for_order("o1");
        let run = RunId::new();
        let (tx, _rx) = mpsc::channel(4);
        registry.register(id.clone(), run, view(), tx.clone()).await.unwrap();

        let dup = registry.register(id.clone(), RunId::new(), view(), tx.clone()).await;
        assert!(matches!(dup, Err(SagaError::AlreadyStarted(_))));

        registry.close(&id, run).await;
        assert!(!registry.is_running(&id).await);
        assert!(registry.status(&id).await.is_ok());
        assert!(matches!(
            registry
                .signal(&id, SagaSignal::new("ping", serde_json::Value::Null))
                .await,
            Err(SagaError::SagaClosed(_))
        ));

        let next = RunId::new();
        registry.register(id.clone(), next, view(), tx).await.unwrap();
        assert_eq!(registry.run_id(&id).await, Some(next));
    }

    #[tokio::test]
    async fn test_retire_finished_saga() {
        let registry = SagaRegistry::new();
        let id = SagaId::for_order("o1");
        let run = RunId::new();
        let (tx, _rx) = mpsc::channel(4);
        registry.register(id.clone(), run, view(), tx).await.unwrap();
        registry.close(&id, run).await;

        registry.retire(&id).await.unwrap();
        assert!(matches!(
            registry.retire(&id).await,
            Err(SagaError::SagaNotFound(_))
        ));
        assert!(registry.status(&id).await.is_err());
    }

    #[tokio::test]
    async fn test_running_saga_cannot_be_retired() {
        let registry = SagaRegistry::new();
        let id = SagaId::for_order("o1");
        let first = RunId::new();
        let (tx, _rx) = mpsc::channel(4);
        registry.register(id.clone(), first, view(), tx.clone()).await.unwrap();
        registry.close(&id, first).await;

        // A restart lands between a caller's check and its retire.
        let second = RunId::new();
        registry.register(id.clone(), second, view(), tx).await.unwrap();

        assert!(matches!(
            registry.retire(&id).await,
            Err(SagaError::StillRunning(_))
        ));
        assert!(registry.is_running(&id).await);
        assert_eq!(registry.run_id(&id).await, Some(second));
        assert!(registry.status(&id).await.is_ok());
    }
}
