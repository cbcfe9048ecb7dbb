use common::OrderId;
use inventory::InventoryError;
use resilience::GuardError;
use thiserror::Error;

use crate::status::OrderStatus;

/// Errors surfaced by the order saga coordinator.
#[derive(Debug, Error)]
pub enum SagaError {
    #[error("invalid order: {0}")]
    Validation(String),

    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("order already exists: {order_id}")]
    DuplicateOrder { order_id: OrderId },

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("{collaborator} unavailable: {reason}")]
    ServiceUnavailable { collaborator: String, reason: String },
}

impl From<GuardError<InventoryError>> for SagaError {
    fn from(err: GuardError<InventoryError>) -> Self {
        match err {
            GuardError::Inner(e) => SagaError::Inventory(e),
            GuardError::Unavailable { collaborator, reason } => {
                SagaError::ServiceUnavailable { collaborator, reason }
            }
        }
    }
}
