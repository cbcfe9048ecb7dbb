//! Order saga state: the items, money, and lifecycle of one order attempt.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId};
use inventory::StockLine;
use serde::{Deserialize, Serialize};

use crate::error::SagaError;
use crate::status::OrderStatus;

/// One line of an order: a product and how many of it at what price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderItem {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32, unit_price: Money) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            unit_price,
        }
    }

    /// Line total: unit price times quantity.
    pub fn total_price(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// The persisted state of one order saga.
///
/// Holds everything needed to resume or compensate the saga: the items
/// (which double as the reservation lines), the running status, and the
/// payment reference once a charge succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSagaState {
    pub order_id: OrderId,
    pub items: Vec<OrderItem>,
    pub shipping_address: String,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub payment_ref: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderSagaState {
    /// Creates a new pending saga. The total is computed from the items.
    pub fn new(order_id: OrderId, items: Vec<OrderItem>, shipping_address: impl Into<String>) -> Self {
        let total_amount = items
            .iter()
            .map(OrderItem::total_price)
            .fold(Money::zero(), |acc, p| acc + p);
        let now = Utc::now();
        Self {
            order_id,
            items,
            shipping_address: shipping_address.into(),
            status: OrderStatus::Pending,
            total_amount,
            payment_ref: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The stock lines this order reserves, one per item.
    pub fn stock_lines(&self) -> Vec<StockLine> {
        self.items
            .iter()
            .map(|item| StockLine::new(item.product_id.clone(), item.quantity))
            .collect()
    }

    fn transition(&mut self, to: OrderStatus) -> Result<(), SagaError> {
        if !self.status.can_transition_to(to) {
            return Err(SagaError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Records that inventory was reserved.
    pub fn mark_reserved(&mut self) -> Result<(), SagaError> {
        self.transition(OrderStatus::StockReserved)
    }

    /// Records that payment was requested.
    pub fn mark_payment_requested(&mut self) -> Result<(), SagaError> {
        self.transition(OrderStatus::PaymentRequested)
    }

    /// Records a successful charge and confirms the order.
    pub fn confirm(&mut self, payment_ref: impl Into<String>) -> Result<(), SagaError> {
        self.transition(OrderStatus::Confirmed)?;
        self.payment_ref = Some(payment_ref.into());
        Ok(())
    }

    /// Enters compensation with the given reason.
    pub fn begin_compensation(&mut self, reason: impl Into<String>) -> Result<(), SagaError> {
        self.transition(OrderStatus::Compensating)?;
        self.failure_reason = Some(reason.into());
        Ok(())
    }

    /// Finishes compensation; the order is cancelled.
    pub fn cancel(&mut self) -> Result<(), SagaError> {
        self.transition(OrderStatus::Cancelled)
    }

    /// Fails a saga that never reserved anything.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), SagaError> {
        self.transition(OrderStatus::Failed)?;
        self.failure_reason = Some(reason.into());
        Ok(())
    }
}
