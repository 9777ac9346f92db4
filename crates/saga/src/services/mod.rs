//! Collaborator traits and in-memory implementations for saga steps.

pub mod billing;
pub mod fulfillment;
pub mod notifier;
pub mod shipment;

pub use billing::{BillingService, ChargeRequest, ChargeResult, InMemoryBillingService};
pub use fulfillment::{FulfillmentPlan, FulfillmentService, InMemoryFulfillmentService};
pub use notifier::{InMemoryNotifier, LoggingNotifier, Notification, Notifier};
pub use shipment::{InMemoryShipmentService, ShipmentOutcome, ShipmentRequest, ShipmentService};
