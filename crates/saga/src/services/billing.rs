//! Billing service trait and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::Item;
use serde::{Deserialize, Serialize};

use crate::error::SagaError;

/// A request to charge a customer for one fulfillment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub customer_id: String,
    /// Idempotency reference; the fulfillment ID.
    pub reference: String,
    pub items: Vec<Item>,
}

/// Result of a successful charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeResult {
    /// The invoice reference assigned by the billing service.
    pub invoice_reference: String,
}

/// Trait for billing operations.
#[async_trait]
pub trait BillingService: Send + Sync {
    /// Charges a customer for the items of one fulfillment.
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeResult, SagaError>;
}

#[derive(Debug, Default)]
struct InMemoryBillingState {
    charges: HashMap<String, (ChargeRequest, String)>,
    next_id: u32,
    attempts: usize,
    fail_on_charge: bool,
    fail_references: HashSet<String>,
    transient_failures: u32,
}

/// In-memory billing service for testing.
///
/// Charges are keyed by reference, so charging the same reference twice
/// returns the first invoice.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBillingService {
    state: Arc<RwLock<InMemoryBillingState>>,
}

impl InMemoryBillingService {
    /// Creates a new in-memory billing service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to decline every charge.
    pub fn set_fail_on_charge(&self, fail: bool) {
        self.state.write().unwrap().fail_on_charge = fail;
    }

    /// Declines every charge carrying this reference.
    pub fn fail_for_reference(&self, reference: impl Into<String>) {
        self.state
            .write()
            .unwrap()
            .fail_references
            .insert(reference.into());
    }

    /// Fails the next `count` charge attempts, then recovers.
    pub fn fail_next(&self, count: u32) {
        self.state.write().unwrap().transient_failures = count;
    }

    /// Returns the number of successful charges.
    pub fn charge_count(&self) -> usize {
        self.state.read().unwrap().charges.len()
    }

    /// Returns the number of charge calls, including failed ones.
    pub fn attempt_count(&self) -> usize {
        self.state.read().unwrap().attempts
    }

    /// Returns true if a charge exists for the given reference.
    pub fn has_charge(&self, reference: &str) -> bool {
        self.state.read().unwrap().charges.contains_key(reference)
    }
}

#[async_trait]
impl BillingService for InMemoryBillingService {
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeResult, SagaError> {
        let mut state = self.state.write().unwrap();
        state.attempts += 1;

        if state.fail_on_charge || state.fail_references.contains(&request.reference) {
            return Err(SagaError::Payment("Payment declined".to_string()));
        }
        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            return Err(SagaError::Payment("Billing ledger unavailable".to_string()));
        }

        if let Some((_, invoice)) = state.charges.get(&request.reference) {
            return Ok(ChargeResult {
                invoice_reference: invoice.clone(),
            });
        }

        state.next_id += 1;
        let invoice_reference = format!("INV-{:04}", state.next_id);
        state.charges.insert(
            request.reference.clone(),
            (request, invoice_reference.clone()),
        );

        Ok(ChargeResult { invoice_reference })
    }
}
