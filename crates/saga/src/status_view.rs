//! Read access to the live order record, and the write handle behind it.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::status::OrderStatus;

/// Read-only accessor over a saga's live [`OrderStatus`].
///
/// Every read takes the status lock, so a snapshot never observes a
/// fulfillment or shipment in the middle of being written.
#[derive(Debug, Clone)]
pub struct StatusView {
    inner: Arc<RwLock<OrderStatus>>,
}

impl StatusView {
    /// Returns a copy of the current order record.
    pub async fn snapshot(&self) -> OrderStatus {
        self.inner.read().await.clone()
    }
}

/// The saga-side handle used to mutate the order record.
///
/// Each fulfillment index is written only by its own task; the listener
/// writes only shipment status fields.
#[derive(Debug, Clone)]
pub(crate) struct SharedStatus {
    inner: Arc<RwLock<OrderStatus>>,
}

impl SharedStatus {
    pub(crate) fn new(status: OrderStatus) -> Self {
        Self {
            inner: Arc::new(RwLock::new(status)),
        }
    }

    pub(crate) fn view(&self) -> StatusView {
        StatusView {
            inner: self.inner.clone(),
        }
    }

    /// Applies `f` under the write lock.
    pub(crate) async fn update<R>(&self, f: impl FnOnce(&mut OrderStatus) -> R) -> R {
        let mut status = self.inner.write().await;
        f(&mut status)
    }
}
