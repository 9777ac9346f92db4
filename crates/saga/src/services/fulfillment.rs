//! Fulfillment service trait and in-memory implementation.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::Item;
use serde::{Deserialize, Serialize};

use crate::error::SagaError;

/// One group of order lines returned by the fulfillment split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentPlan {
    pub id: String,
    pub items: Vec<Item>,
}

/// Splits an order into independently processed fulfillments.
#[async_trait]
pub trait FulfillmentService: Send + Sync {
    async fn fulfill_order(
        &self,
        order_id: &str,
        items: Vec<Item>,
    ) -> Result<Vec<FulfillmentPlan>, SagaError>;
}

#[derive(Debug)]
struct InMemoryFulfillmentState {
    items_per_fulfillment: usize,
    delay: Option<Duration>,
    fail_on_fulfill: bool,
    calls: usize,
}

impl Default for InMemoryFulfillmentState {
    fn default() -> Self {
        Self {
            items_per_fulfillment: 1,
            delay: None,
            fail_on_fulfill: false,
            calls: 0,
        }
    }
}

/// In-memory fulfillment service.
///
/// Splits an order into fulfillments of at most `items_per_fulfillment`
/// lines each, named `<order_id>:<n>` starting at 1.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFulfillmentService {
    state: Arc<RwLock<InMemoryFulfillmentState>>,
}

impl InMemoryFulfillmentService {
    /// Creates a service that puts every line in its own fulfillment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many lines go into each fulfillment.
    pub fn set_items_per_fulfillment(&self, count: usize) {
        self.state.write().unwrap().items_per_fulfillment = count.max(1);
    }

    /// Configures the service to fail every split.
    pub fn set_fail_on_fulfill(&self, fail: bool) {
        self.state.write().unwrap().fail_on_fulfill = fail;
    }

    /// Makes every split take at least this long.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.write().unwrap().delay = delay;
    }

    /// Returns how many times the split was requested.
    pub fn call_count(&self) -> usize {
        self.state.read().unwrap().calls
    }
}

#[async_trait]
impl FulfillmentService for InMemoryFulfillmentService {
    async fn fulfill_order(
        &self,
        order_id: &str,
        items: Vec<Item>,
    ) -> Result<Vec<FulfillmentPlan>, SagaError> {
        let (delay, chunk) = {
            let mut state = self.state.write().unwrap();
            state.calls += 1;
            if state.fail_on_fulfill {
                return Err(SagaError::Fulfillment(
                    "No warehouse can fulfill the order".to_string(),
                ));
            }
            (state.delay, state.items_per_fulfillment)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        Ok(items
            .chunks(chunk)
            .enumerate()
            .map(|(n, lines)| FulfillmentPlan {
                id: format!("{}:{}", order_id, n + 1),
                items: lines.to_vec(),
            })
            .collect())
    }
}
