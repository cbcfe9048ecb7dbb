//! Inventory store trait and request validation.

use async_trait::async_trait;
use common::{OrderId, ProductId};

use crate::error::{InventoryError, Result};
use crate::record::{InventoryRecord, StockLevel, StockLine};

/// Transactional storage for inventory records.
///
/// Implementations must make every mutating operation atomic across all
/// items in the request: either all counters move or none do. Concurrent
/// mutations of the same product serialise at the storage layer (a single
/// lock for the in-memory store, row locks for the Postgres store).
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Creates a record. Fails with `AlreadyExists` if the product has one.
    /// The new record must have nothing reserved.
    async fn create_record(&self, record: InventoryRecord) -> Result<()>;

    /// Loads a record, or None if the product is unknown.
    async fn get_record(&self, product_id: &ProductId) -> Result<Option<InventoryRecord>>;

    /// Pure read: checks every line's `available >= requested` and that the
    /// product is active. Returns the first offending line's error.
    async fn verify_availability(&self, lines: &[StockLine]) -> Result<()>;

    /// Atomically reserves all lines for the order, re-verifying
    /// availability inside the same transaction. Idempotent per order:
    /// replaying the identical request is a no-op, replaying a different
    /// item set for the same order is a `ReservationConflict`.
    ///
    /// The per-order hold is retained even once fully drained by
    /// release/confirm; it is what makes the replay detection above work
    /// for settled orders.
    ///
    /// Returns the committed counter levels of the affected products.
    async fn reserve(&self, order_id: OrderId, lines: &[StockLine]) -> Result<Vec<StockLevel>>;

    /// Releases held quantity for the order, clamped to what the order
    /// still holds. Safe to call any number of times.
    async fn release(&self, order_id: OrderId, lines: &[StockLine]) -> Result<()>;

    /// Consumes held stock: decrements `on_hand` and `reserved` together,
    /// clamped to the order's remaining hold.
    ///
    /// Returns the committed counter levels of the affected products.
    async fn confirm(&self, order_id: OrderId, lines: &[StockLine]) -> Result<Vec<StockLevel>>;

    /// Administrative correction of the on-hand count. Fails with
    /// `InvalidArgument` if the new count is below the reserved quantity.
    async fn adjust_stock(&self, product_id: &ProductId, new_on_hand: u32) -> Result<()>;

    /// Activates or deactivates a product for new reservations.
    async fn set_active(&self, product_id: &ProductId, active: bool) -> Result<()>;
}

/// Validates a request's lines before any side effect.
///
/// Rejects empty requests, zero quantities, and duplicated products (a
/// duplicate would make the per-order hold lines ambiguous).
pub fn validate_lines(lines: &[StockLine]) -> Result<()> {
    if lines.is_empty() {
        return Err(InventoryError::InvalidArgument(
            "request contains no items".to_string(),
        ));
    }
    for (i, line) in lines.iter().enumerate() {
        if line.quantity == 0 {
            return Err(InventoryError::InvalidArgument(format!(
                "zero quantity for product {}",
                line.product_id
            )));
        }
        if lines[..i].iter().any(|l| l.product_id == line.product_id) {
            return Err(InventoryError::InvalidArgument(format!(
                "duplicate product {} in request",
                line.product_id
            )));
        }
    }
    Ok(())
}

/// Compares two item sets ignoring order.
pub(crate) fn same_item_set(a: &[StockLine], b: &[StockLine]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().all(|line| {
        b.iter()
            .any(|other| other.product_id == line.product_id && other.quantity == line.quantity)
    })
}
