//! Inventory ledger error types.

use common::{OrderId, ProductId};
use resilience::Transient;
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Malformed input, rejected before any side effect.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A record already exists for the product.
    #[error("Inventory record already exists for product {0}")]
    AlreadyExists(ProductId),

    /// No record exists for the product.
    #[error("Unknown product: {0}")]
    NotFound(ProductId),

    /// Business-rule failure: not enough available stock. Reports the first
    /// insufficient item, not an aggregate, for deterministic messages.
    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// The product exists but no longer accepts reservations.
    #[error("Product {0} is inactive")]
    Inactive(ProductId),

    /// A reservation was replayed for this order with a different item set.
    #[error("Reservation for order {0} replayed with a different item set")]
    ReservationConflict(OrderId),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl Transient for InventoryError {
    fn is_transient(&self) -> bool {
        matches!(self, InventoryError::Storage(_))
    }
}

/// Convenience type alias for ledger results.
pub type Result<T> = std::result::Result<T, InventoryError>;
