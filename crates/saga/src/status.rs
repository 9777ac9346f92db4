//! The live order record exposed by the status query.

use chrono::{DateTime, Utc};
use common::{Item, ShipmentId};
use serde::{Deserialize, Serialize};

use crate::input::OrderInput;
use crate::services::FulfillmentPlan;
use crate::state::FulfillmentState;

/// Real-world progress of a shipment, as reported by shipment events.
///
/// The variants are ordered, but updates are applied as they arrive;
/// a late `Dispatched` after `Delivered` is not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShipmentStatus {
    Created,
    Dispatched,
    Delivered,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Created => "created",
            ShipmentStatus::Dispatched => "dispatched",
            ShipmentStatus::Delivered => "delivered",
        }
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress of the fulfillment task itself.
///
/// Written only by the owning task. Kept apart from [`Shipment::status`],
/// which only shipment events write, so the two can disagree: a shipment
/// can be `delivered` while its task is still waiting, or the task can be
/// `shipment_failed` while the status still reads `dispatched`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    #[default]
    Pending,
    Charged,
    ShipmentRequested,
    Completed,
    PaymentFailed,
    ShipmentFailed,
}

impl TaskState {
    /// Returns true once the task has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::PaymentFailed | TaskState::ShipmentFailed
        )
    }
}

/// A shipment reference recorded on its fulfillment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    /// Unset until the first shipment event arrives.
    pub status: Option<ShipmentStatus>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Shipment {
    /// A shipment that has been requested but not yet reported on.
    pub fn requested(id: ShipmentId) -> Self {
        Self {
            id,
            status: None,
            updated_at: None,
        }
    }
}

/// A group of order lines processed independently of its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fulfillment {
    pub id: String,
    pub items: Vec<Item>,
    pub task: TaskState,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub shipment: Option<Shipment>,
}

impl Fulfillment {
    /// The fulfillment state machine position, derived from both views.
    pub fn state(&self) -> FulfillmentState {
        FulfillmentState::derive(self.task, self.shipment.as_ref().and_then(|s| s.status))
    }
}

impl From<FulfillmentPlan> for Fulfillment {
    fn from(plan: FulfillmentPlan) -> Self {
        Self {
            id: plan.id,
            items: plan.items,
            task: TaskState::Pending,
            shipment: None,
        }
    }
}

/// The live, query-visible record of an order saga.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatus {
    pub id: String,
    pub customer_id: String,
    pub items: Vec<Item>,
    pub fulfillments: Vec<Fulfillment>,
}

impl OrderStatus {
    /// The initial record for an accepted order, before any split.
    pub fn new(input: &OrderInput) -> Self {
        Self {
            id: input.id.clone(),
            customer_id: input.customer_id.clone(),
            items: input.items.clone(),
            fulfillments: Vec::new(),
        }
    }

    /// Applies a shipment status to the first shipment with a matching ID.
    ///
    /// Returns the index of the updated fulfillment, or `None` if nothing
    /// matched. Later entries sharing the ID are left untouched.
    pub fn apply_shipment_status(
        &mut self,
        shipment_id: &ShipmentId,
        status: ShipmentStatus,
        at: DateTime<Utc>,
    ) -> Option<usize> {
        for (index, fulfillment) in self.fulfillments.iter_mut().enumerate() {
            if let Some(shipment) = fulfillment.shipment.as_mut() {
                if &shipment.id == shipment_id {
                    shipment.status = Some(status);
                    shipment.updated_at = Some(at);
                    return Some(index);
                }
            }
        }
        None
    }

    /// Returns the fulfillment carrying the given shipment, if any.
    pub fn fulfillment_for_shipment(&self, shipment_id: &ShipmentId) -> Option<&Fulfillment> {
        self.fulfillments
            .iter()
            .find(|f| f.shipment.as_ref().is_some_and(|s| &s.id == shipment_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_with_shipments(ids: &[&str]) -> OrderStatus {
        let input = OrderInput::new("o1", "c1", vec![Item::new("SKU-1", 1)]);
        let mut status = OrderStatus::new(&input);
        for (n, id) in ids.iter().enumerate() {
            status.fulfillments.push(Fulfillment {
                id: format!("f{n}"),
                items: vec![Item::new("SKU-1", 1)],
                task: TaskState::ShipmentRequested,
                shipment: Some(Shipment::requested(ShipmentId::new(*id))),
            });
        }
        status
    }

    #[test]
    fn test_apply_updates_only_the_match() {
        let mut status = status_with_shipments(&["Shipment:a", "Shipment:b"]);
        let updated = status.apply_shipment_status(
            &ShipmentId::new("Shipment:b"),
            ShipmentStatus::Dispatched,
            Utc::now(),
        );

        assert_eq!(updated, Some(1));
        assert_eq!(status.fulfillments[0].shipment.as_ref().unwrap().status, None);
        assert_eq!(
            status.fulfillments[1].shipment.as_ref().unwrap().status,
            Some(ShipmentStatus::Dispatched)
        );
    }

    #[test]
    fn test_apply_without_match_changes_nothing() {
        let mut status = status_with_shipments(&["Shipment:a"]);
        let before = status.clone();
        let updated = status.apply_shipment_status(
            &ShipmentId::new("Shipment:zzz"),
            ShipmentStatus::Delivered,
            Utc::now(),
        );
        assert_eq!(updated, None);
        assert_eq!(status, before);
    }

    #[test]
    fn test_apply_duplicate_ids_updates_first_only() {
        let mut status = status_with_shipments(&["Shipment:dup", "Shipment:dup"]);
        status.apply_shipment_status(
            &ShipmentId::new("Shipment:dup"),
            ShipmentStatus::Delivered,
            Utc::now(),
        );
        assert_eq!(
            status.fulfillments[0].shipment.as_ref().unwrap().status,
            Some(ShipmentStatus::Delivered)
        );
        assert_eq!(status.fulfillments[1].shipment.as_ref().unwrap().status, None);
    }

    #[test]
    fn test_shipment_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&ShipmentStatus::Dispatched).unwrap(),
            "\"dispatched\""
        );
        let parsed: ShipmentStatus = serde_json::from_str("\"delivered\"").unwrap();
        assert_eq!(parsed, ShipmentStatus::Delivered);
        assert!(ShipmentStatus::Created < ShipmentStatus::Delivered);
    }

    #[test]
    fn test_fulfillment_without_shipment_omits_field() {
        let f = Fulfillment {
            id: "f1".to_string(),
            items: vec![],
            task: TaskState::PaymentFailed,
            shipment: None,
        };
        let json = serde_json::to_value(&f).unwrap();
        assert!(json.get("shipment").is_none());
        assert_eq!(json["task"], "payment_failed");
    }
}
