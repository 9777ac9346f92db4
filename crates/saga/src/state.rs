//! Per-fulfillment state machine.

use serde::{Deserialize, Serialize};

use crate::status::{ShipmentStatus, TaskState};

/// Where a fulfillment stands, combining task progress and shipment events.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Charged ──► ShipmentRequested ──► Dispatched ──► Delivered
///           └──► Failed
/// ```
///
/// `Dispatched` and `Delivered` come only from shipment events, whether or
/// not the shipment sub-process has returned. A failed shipment sub-process
/// does not move the fulfillment to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FulfillmentState {
    #[default]
    Pending,
    Charged,
    ShipmentRequested,
    Dispatched,
    Delivered,
    /// The charge failed (terminal).
    Failed,
}

impl FulfillmentState {
    /// Computes the state from the task view and the event-driven status.
    pub fn derive(task: TaskState, shipment_status: Option<ShipmentStatus>) -> Self {
        if task == TaskState::PaymentFailed {
            return FulfillmentState::Failed;
        }
        match shipment_status {
            Some(ShipmentStatus::Delivered) => FulfillmentState::Delivered,
            Some(ShipmentStatus::Dispatched) => FulfillmentState::Dispatched,
            Some(ShipmentStatus::Created) => FulfillmentState::ShipmentRequested,
            None => match task {
                TaskState::Pending => FulfillmentState::Pending,
                TaskState::Charged => FulfillmentState::Charged,
                _ => FulfillmentState::ShipmentRequested,
            },
        }
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FulfillmentState::Delivered | FulfillmentState::Failed)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentState::Pending => "Pending",
            FulfillmentState::Charged => "Charged",
            FulfillmentState::ShipmentRequested => "ShipmentRequested",
            FulfillmentState::Dispatched => "Dispatched",
            FulfillmentState::Delivered => "Delivered",
            FulfillmentState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for FulfillmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_pending() {
        assert_eq!(FulfillmentState::default(), FulfillmentState::Pending);
    }

    #[test]
    fn test_task_progress_before_events() {
        assert_eq!(
            FulfillmentState::derive(TaskState::Pending, None),
            FulfillmentState::Pending
        );
        assert_eq!(
            FulfillmentState::derive(TaskState::Charged, None),
            FulfillmentState::Charged
        );
        assert_eq!(
            FulfillmentState::derive(TaskState::ShipmentRequested, None),
            FulfillmentState::ShipmentRequested
        );
    }

    #[test]
    fn test_payment_failure_is_failed() {
        assert_eq!(
            FulfillmentState::derive(TaskState::PaymentFailed, None),
            FulfillmentState::Failed
        );
    }

    #[test]
    fn test_events_drive_shipment_progress() {
        assert_eq!(
            FulfillmentState::derive(
                TaskState::ShipmentRequested,
                Some(ShipmentStatus::Dispatched)
            ),
            FulfillmentState::Dispatched
        );
        assert_eq!(
            FulfillmentState::derive(TaskState::Completed, Some(ShipmentStatus::Delivered)),
            FulfillmentState::Delivered
        );
    }

    #[test]
    fn test_shipment_failure_does_not_mark_failed() {
        assert_eq!(
            FulfillmentState::derive(
                TaskState::ShipmentFailed,
                Some(ShipmentStatus::Dispatched)
            ),
            FulfillmentState::Dispatched
        );
        assert_eq!(
            FulfillmentState::derive(TaskState::ShipmentFailed, None),
            FulfillmentState::ShipmentRequested
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(FulfillmentState::Delivered.is_terminal());
        assert!(FulfillmentState::Failed.is_terminal());
        assert!(!FulfillmentState::Dispatched.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(FulfillmentState::ShipmentRequested.to_string(), "ShipmentRequested");
    }
}
