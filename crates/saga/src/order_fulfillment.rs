//! Order fulfillment saga constants.

/// The saga type identifier for order fulfillment.
pub const SAGA_TYPE: &str = "Order";

/// Query name answered with the live order status.
pub const STATUS_QUERY: &str = "status";

/// Signal name carrying shipment status changes back to the order saga.
pub const SHIPMENT_STATUS_UPDATED_SIGNAL: &str = "shipment-status-updated";

/// Activity name: split the order into fulfillments.
pub const ACTIVITY_FULFILL_ORDER: &str = "fulfill_order";

/// Activity name: charge the customer for one fulfillment.
pub const ACTIVITY_CHARGE: &str = "charge";
