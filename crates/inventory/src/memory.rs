//! In-memory inventory store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, ProductId};
use tokio::sync::RwLock;

use crate::error::{InventoryError, Result};
use crate::record::{InventoryRecord, StockLevel, StockLine};
use crate::store::{InventoryStore, same_item_set, validate_lines};

#[derive(Debug, Clone)]
struct Hold {
    requested: Vec<StockLine>,
    remaining: HashMap<ProductId, u32>,
}

#[derive(Debug, Default)]
struct State {
    records: HashMap<ProductId, InventoryRecord>,
    holds: HashMap<OrderId, Hold>,
}

impl State {
    fn record(&self, product_id: &ProductId) -> Result<&InventoryRecord> {
        self.records
            .get(product_id)
            .ok_or_else(|| InventoryError::NotFound(product_id.clone()))
    }

    fn record_mut(&mut self, product_id: &ProductId) -> Result<&mut InventoryRecord> {
        self.records
            .get_mut(product_id)
            .ok_or_else(|| InventoryError::NotFound(product_id.clone()))
    }

    fn check_line(&self, line: &StockLine) -> Result<()> {
        let record = self.record(&line.product_id)?;
        if !record.active {
            return Err(InventoryError::Inactive(line.product_id.clone()));
        }
        if record.available() < line.quantity {
            return Err(InventoryError::InsufficientStock {
                product_id: line.product_id.clone(),
                requested: line.quantity,
                available: record.available(),
            });
        }
        Ok(())
    }
}

/// In-memory inventory store.
///
/// A single async lock plays the role of the storage transaction: every
/// mutating operation holds the write lock for its whole read-verify-write
/// cycle, so mutations across a request's items are all-or-nothing and
/// concurrent reservations against the same product serialise.
///
/// Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryInventoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the quantity the order still holds for the product.
    pub async fn held_for(&self, order_id: OrderId, product_id: &ProductId) -> u32 {
        self.state
            .read()
            .await
            .holds
            .get(&order_id)
            .and_then(|h| h.remaining.get(product_id))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn create_record(&self, record: InventoryRecord) -> Result<()> {
        if record.reserved != 0 {
            return Err(InventoryError::InvalidArgument(
                "new record must have nothing reserved".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        if state.records.contains_key(&record.product_id) {
            return Err(InventoryError::AlreadyExists(record.product_id));
        }
        state.records.insert(record.product_id.clone(), record);
        Ok(())
    }

    async fn get_record(&self, product_id: &ProductId) -> Result<Option<InventoryRecord>> {
        Ok(self.state.read().await.records.get(product_id).cloned())
    }

    async fn verify_availability(&self, lines: &[StockLine]) -> Result<()> {
        validate_lines(lines)?;
        let state = self.state.read().await;
        for line in lines {
            state.check_line(line)?;
        }
        Ok(())
    }

    async fn reserve(&self, order_id: OrderId, lines: &[StockLine]) -> Result<Vec<StockLevel>> {
        validate_lines(lines)?;
        let mut state = self.state.write().await;

        // Idempotent replay: the identical request is a no-op, a different
        // item set for the same order is a caller bug.
        if let Some(hold) = state.holds.get(&order_id) {
            if !same_item_set(&hold.requested, lines) {
                return Err(InventoryError::ReservationConflict(order_id));
            }
            return lines
                .iter()
                .map(|l| state.record(&l.product_id).map(InventoryRecord::level))
                .collect();
        }

        // Re-verify inside the "transaction" (under the write lock), then
        // apply. Any failing line aborts before any counter moves.
        for line in lines {
            state.check_line(line)?;
        }

        let mut remaining = HashMap::new();
        let mut levels = Vec::with_capacity(lines.len());
        for line in lines {
            let record = state.record_mut(&line.product_id)?;
            record.reserved += line.quantity;
            remaining.insert(line.product_id.clone(), line.quantity);
            levels.push(record.level());
        }
        state.holds.insert(
            order_id,
            Hold {
                requested: lines.to_vec(),
                remaining,
            },
        );

        Ok(levels)
    }

    async fn release(&self, order_id: OrderId, lines: &[StockLine]) -> Result<()> {
        validate_lines(lines)?;
        let mut state = self.state.write().await;

        let Some(mut hold) = state.holds.remove(&order_id) else {
            // Nothing held for this order; over-release is clamped, not an error.
            return Ok(());
        };

        for line in lines {
            let held = hold.remaining.get(&line.product_id).copied().unwrap_or(0);
            let take = line.quantity.min(held);
            if take == 0 {
                continue;
            }
            let record = state.record_mut(&line.product_id)?;
            record.reserved -= take;
            hold.remaining
                .insert(line.product_id.clone(), held - take);
        }
        state.holds.insert(order_id, hold);

        Ok(())
    }

    async fn confirm(&self, order_id: OrderId, lines: &[StockLine]) -> Result<Vec<StockLevel>> {
        validate_lines(lines)?;
        let mut state = self.state.write().await;

        // Resolve every record before touching anything: an unknown product
        // must fail the whole request with counters and hold intact.
        for line in lines {
            state.record(&line.product_id)?;
        }

        let Some(mut hold) = state.holds.remove(&order_id) else {
            return Ok(Vec::new());
        };

        let mut levels = Vec::with_capacity(lines.len());
        for line in lines {
            let held = hold.remaining.get(&line.product_id).copied().unwrap_or(0);
            let take = line.quantity.min(held);
            let record = state.record_mut(&line.product_id)?;
            if take > 0 {
                record.on_hand -= take;
                record.reserved -= take;
                hold.remaining
                    .insert(line.product_id.clone(), held - take);
            }
            levels.push(record.level());
        }
        state.holds.insert(order_id, hold);

        Ok(levels)
    }

    async fn adjust_stock(&self, product_id: &ProductId, new_on_hand: u32) -> Result<()> {
        let mut state = self.state.write().await;
        let record = state.record_mut(product_id)?;
        if new_on_hand < record.reserved {
            return Err(InventoryError::InvalidArgument(format!(
                "cannot shrink on-hand below reserved quantity ({})",
                record.reserved
            )));
        }
        record.on_hand = new_on_hand;
        Ok(())
    }

    async fn set_active(&self, product_id: &ProductId, active: bool) -> Result<()> {
        let mut state = self.state.write().await;
        state.record_mut(product_id)?.active = active;
        Ok(())
    }
}
