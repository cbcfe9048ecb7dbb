//! Inventory ledger: per-product stock counters with atomic
//! reserve/release/confirm/adjust operations.
//!
//! Every mutating operation runs inside a storage-level transaction that
//! serialises concurrent access at the affected rows, and availability is
//! re-verified inside the same transaction that performs the write, so the
//! `0 <= reserved <= on_hand` invariant holds at all observable times.
//! Reservations are idempotent per order: the ledger records per-order hold
//! lines and clamps release/confirm against them.

pub mod error;
pub mod ledger;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod store;

pub use error::{InventoryError, Result};
pub use ledger::InventoryLedger;
pub use memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;
pub use record::{InventoryRecord, StockLevel, StockLine};
pub use store::InventoryStore;
