//! Inventory record and stock line types.

use common::ProductId;
use serde::{Deserialize, Serialize};

/// Per-product stock counters and warehouse metadata.
///
/// Invariant: `0 <= reserved <= on_hand` at all times. `available` is never
/// persisted; it is always computed as `on_hand - reserved`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    /// The product this record tracks.
    pub product_id: ProductId,

    /// Physically available units.
    pub on_hand: u32,

    /// Units held against open orders.
    pub reserved: u32,

    /// Warehouse location code.
    pub warehouse_location: String,

    /// Available quantity at or below which a low-stock notification fires.
    pub reorder_threshold: u32,

    /// Advisory reorder batch size.
    pub reorder_quantity: u32,

    /// Inactive products stop receiving reservations but are never deleted.
    pub active: bool,
}

impl InventoryRecord {
    /// Creates a fresh record with nothing reserved.
    pub fn new(product_id: impl Into<ProductId>, on_hand: u32, location: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            on_hand,
            reserved: 0,
            warehouse_location: location.into(),
            reorder_threshold: 0,
            reorder_quantity: 0,
            active: true,
        }
    }

    /// Sets the advisory reorder parameters.
    pub fn with_reorder(mut self, threshold: u32, quantity: u32) -> Self {
        self.reorder_threshold = threshold;
        self.reorder_quantity = quantity;
        self
    }

    /// Quantity that may still be promised to new orders.
    pub fn available(&self) -> u32 {
        self.on_hand - self.reserved
    }

    /// Post-mutation counter view of this record.
    pub fn level(&self) -> StockLevel {
        StockLevel {
            product_id: self.product_id.clone(),
            on_hand: self.on_hand,
            reserved: self.reserved,
            reorder_threshold: self.reorder_threshold,
            reorder_quantity: self.reorder_quantity,
        }
    }
}

/// One line of a reservation request: a product and a quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl StockLine {
    /// Creates a stock line.
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Counter state of a record as observed after a committed mutation.
///
/// Returned by `reserve`/`confirm` so the ledger can decide on low-stock and
/// out-of-stock notifications from the exact committed values instead of
/// re-reading outside the transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub on_hand: u32,
    pub reserved: u32,
    pub reorder_threshold: u32,
    pub reorder_quantity: u32,
}

impl StockLevel {
    /// Quantity still available for new reservations.
    pub fn available(&self) -> u32 {
        self.on_hand - self.reserved
    }

    /// True when the available quantity has dropped to the reorder line.
    pub fn is_low(&self) -> bool {
        self.available() <= self.reorder_threshold
    }
}
