//! Order fulfillment saga.
//!
//! An order is split into fulfillments, and each fulfillment is charged and
//! shipped concurrently with its siblings:
//! 1. Split the order into fulfillments
//! 2. Per fulfillment: charge the customer, then start a shipment and wait
//! 3. Wait for every fulfillment to finish, whatever its outcome
//!
//! While a saga runs, its order record can be queried at any time, and
//! `shipment-status-updated` signals are merged into it by a background
//! listener. A failed fulfillment does not affect its siblings and nothing
//! is rolled back; failed shipments go through a [`ShipmentCompensation`]
//! hook that does nothing by default.

mod activity;
pub mod compensation;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
mod fulfillment_task;
pub mod input;
pub mod listener;
pub mod order_fulfillment;
mod order_saga;
pub mod registry;
pub mod services;
pub mod state;
pub mod status;
pub mod status_view;

pub use compensation::{CompensationContext, NoCompensation, ShipmentCompensation};
pub use config::{RetryPolicy, SagaConfig};
pub use coordinator::{SagaCoordinator, SagaHandle};
pub use error::{SagaError, ValidationError};
pub use events::{SagaSignal, ShipmentStatusUpdated, SignalSink};
pub use input::{OrderInput, OrderResult};
pub use listener::ListenerStats;
pub use order_saga::SagaServices;
pub use registry::SagaRegistry;
pub use services::{
    BillingService, ChargeRequest, ChargeResult, FulfillmentPlan, FulfillmentService,
    InMemoryBillingService, InMemoryFulfillmentService, InMemoryNotifier,
    InMemoryShipmentService, LoggingNotifier, Notification, Notifier, ShipmentOutcome,
    ShipmentRequest, ShipmentService,
};
pub use state::FulfillmentState;
pub use status::{Fulfillment, OrderStatus, Shipment, ShipmentStatus, TaskState};
pub use status_view::StatusView;
