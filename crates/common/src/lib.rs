//! Shared types for the order fulfillment saga.

pub mod types;

pub use types::{Item, RunId, SagaId, ShipmentId};
