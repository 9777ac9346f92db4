//! Order input accepted by the saga and the result it returns.

use common::{Item, SagaId};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// An order submitted for fulfillment. Immutable once accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderInput {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub items: Vec<Item>,
}

impl OrderInput {
    pub fn new(id: impl Into<String>, customer_id: impl Into<String>, items: Vec<Item>) -> Self {
        Self {
            id: id.into(),
            customer_id: customer_id.into(),
            items,
        }
    }

    /// Checks the order can be accepted. Has no side effects.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::MissingId);
        }
        if self.customer_id.is_empty() {
            return Err(ValidationError::MissingCustomerId);
        }
        if self.items.is_empty() {
            return Err(ValidationError::NoItems);
        }
        Ok(())
    }

    /// The identity of the saga that fulfills this order.
    pub fn saga_id(&self) -> SagaId {
        SagaId::for_order(&self.id)
    }
}

/// Terminal result of an order saga.
///
/// Per-fulfillment outcomes are only visible through the status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResult {
    pub order_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<Item> {
        vec![Item::new("SKU-1", 1)]
    }

    #[test]
    fn test_valid_input() {
        assert!(OrderInput::new("o1", "c1", items()).validate().is_ok());
    }

    #[test]
    fn test_missing_fields() {
        assert_eq!(
            OrderInput::new("", "c1", items()).validate(),
            Err(ValidationError::MissingId)
        );
        assert_eq!(
            OrderInput::new("o1", "", items()).validate(),
            Err(ValidationError::MissingCustomerId)
        );
        assert_eq!(
            OrderInput::new("o1", "c1", vec![]).validate(),
            Err(ValidationError::NoItems)
        );
    }

    #[test]
    fn test_id_checked_before_customer() {
        assert_eq!(
            OrderInput::new("", "", vec![]).validate(),
            Err(ValidationError::MissingId)
        );
    }

    #[test]
    fn test_deserialize_from_json() {
        let input: OrderInput = serde_json::from_value(serde_json::json!({
            "id": "o1",
            "customer_id": "c1",
            "items": [{"sku": "SKU-1", "quantity": 3}]
        }))
        .unwrap();
        assert_eq!(input.items[0].quantity, 3);
        assert_eq!(input.saga_id().as_str(), "Order:o1");
    }

    #[test]
    fn test_missing_fields_deserialize_as_invalid() {
        let input: OrderInput =
            serde_json::from_value(serde_json::json!({ "id": "o1" })).unwrap();
        assert_eq!(input.validate(), Err(ValidationError::MissingCustomerId));
    }
}
