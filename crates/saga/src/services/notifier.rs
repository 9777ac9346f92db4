//! Customer notifications sent as a shipment progresses.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::SagaError;
use crate::status::ShipmentStatus;

/// A message to the customer about their order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub order_id: String,
    pub subject: String,
    pub body: String,
}

impl Notification {
    /// The notification sent when a shipment reaches `status`.
    pub fn for_shipment_status(order_id: &str, status: ShipmentStatus) -> Self {
        let (subject, body) = match status {
            ShipmentStatus::Created => (
                format!("Shipment for order: {order_id}"),
                "Your order has been processed and shipping has been arranged with the courier. \
                 We'll be in touch once it's dispatched.",
            ),
            ShipmentStatus::Dispatched => (
                format!("Shipment dispatched for order: {order_id}"),
                "Your order has been dispatched.",
            ),
            ShipmentStatus::Delivered => (
                format!("Shipment delivered for order: {order_id}"),
                "Your order has been delivered.",
            ),
        };
        Self {
            order_id: order_id.to_string(),
            subject,
            body: body.to_string(),
        }
    }
}

/// Sends notifications to customers.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), SagaError>;
}

/// Writes notifications to the log instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), SagaError> {
        tracing::info!(
            order_id = %notification.order_id,
            subject = %notification.subject,
            "customer notification"
        );
        Ok(())
    }
}

/// Keeps every notification in memory for inspection.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    sent: Arc<RwLock<Vec<Notification>>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the notifications sent so far, oldest first.
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.read().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), SagaError> {
        self.sent.write().unwrap().push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subjects_name_the_order() {
        let n = Notification::for_shipment_status("o1", ShipmentStatus::Dispatched);
        assert_eq!(n.subject, "Shipment dispatched for order: o1");
        assert_eq!(n.body, "Your order has been dispatched.");
    }

    #[tokio::test]
    async fn test_in_memory_notifier_records() {
        let notifier = InMemoryNotifier::new();
        notifier
            .notify(Notification::for_shipment_status("o1", ShipmentStatus::Delivered))
            .await
            .unwrap();
        assert_eq!(notifier.sent().len(), 1);
    }
}
