//! Payment collaborator.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{Money, OrderId};
use resilience::Transient;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// The result of a successful charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeOutcome {
    /// Provider-side reference for the transaction.
    pub transaction_id: String,
}

/// Payment failures.
///
/// A decline is a business answer and is never retried; unavailability is
/// an infrastructure fault and is.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment declined: {0}")]
    Declined(String),

    #[error("payment provider unavailable: {0}")]
    Unavailable(String),
}

impl Transient for PaymentError {
    fn is_transient(&self) -> bool {
        matches!(self, PaymentError::Unavailable(_))
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Invoice,
}

/// Charges customers for orders.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Charges the given amount for an order.
    ///
    /// Implementations must be idempotent per order: a replayed charge for
    /// an order that already paid returns the original outcome.
    async fn charge(
        &self,
        order_id: OrderId,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<ChargeOutcome, PaymentError>;
}

/// In-memory payment service for tests and local development.
#[derive(Clone, Default)]
pub struct InMemoryPaymentService {
    state: Arc<RwLock<PaymentState>>,
}

#[derive(Default)]
struct PaymentState {
    payments: HashMap<OrderId, String>,
    next_id: u64,
    fail_on_charge: bool,
    unavailable: bool,
}

impl InMemoryPaymentService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent charge come back declined.
    pub async fn set_fail_on_charge(&self, fail: bool) {
        self.state.write().await.fail_on_charge = fail;
    }

    /// Makes the provider unreachable.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }

    /// Number of distinct orders charged.
    pub async fn payment_count(&self) -> usize {
        self.state.read().await.payments.len()
    }

    /// True if the given order has been charged.
    pub async fn has_payment(&self, order_id: OrderId) -> bool {
        self.state.read().await.payments.contains_key(&order_id)
    }
}

#[async_trait]
impl PaymentService for InMemoryPaymentService {
    async fn charge(
        &self,
        order_id: OrderId,
        amount: Money,
        _method: PaymentMethod,
    ) -> Result<ChargeOutcome, PaymentError> {
        let mut state = self.state.write().await;

        if state.unavailable {
            return Err(PaymentError::Unavailable(
                "simulated provider outage".to_string(),
            ));
        }
        if let Some(transaction_id) = state.payments.get(&order_id) {
            return Ok(ChargeOutcome {
                transaction_id: transaction_id.clone(),
            });
        }
        if state.fail_on_charge {
            return Err(PaymentError::Declined("card declined".to_string()));
        }
        if !amount.is_positive() {
            return Err(PaymentError::Declined(format!(
                "invalid charge amount: {amount}"
            )));
        }

        state.next_id += 1;
        let transaction_id = format!("PAY-{:04}", state.next_id);
        state.payments.insert(order_id, transaction_id.clone());
        Ok(ChargeOutcome { transaction_id })
    }
}
