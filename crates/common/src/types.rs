use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single order line: a SKU and how many of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    pub sku: String,
    pub quantity: u32,
}

impl Item {
    /// Creates a new line item.
    pub fn new(sku: impl Into<String>, quantity: u32) -> Self {
        Self {
            sku: sku.into(),
            quantity,
        }
    }
}

/// Identity of an order saga instance.
///
/// Derived from the order ID so that starting the same order twice
/// addresses the same saga.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SagaId(String);

impl SagaId {
    /// Prefix shared by every order saga identity.
    pub const PREFIX: &'static str = "Order:";

    /// Returns the saga identity for an order.
    pub fn for_order(order_id: &str) -> Self {
        Self(format!("{}{}", Self::PREFIX, order_id))
    }

    /// Wraps an already-formed saga identity.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SagaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a shipment sub-process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShipmentId(String);

impl ShipmentId {
    /// Prefix shared by every shipment identity.
    pub const PREFIX: &'static str = "Shipment:";

    /// Derives the shipment identity from the fulfillment it ships.
    pub fn for_fulfillment(fulfillment_id: &str) -> Self {
        Self(format!("{}{}", Self::PREFIX, fulfillment_id))
    }

    /// Wraps an already-formed shipment identity.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ShipmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ShipmentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifies one execution of a saga.
///
/// A saga identity can be reused once its previous run has been retired;
/// the run ID tells the executions apart in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Creates a new random run ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
