//! Inventory ledger service: storage operations plus post-commit
//! best-effort notifications.

use common::{OrderId, ProductId};
use notify::{Notification, NotificationChannel, NotificationEmitter};

use crate::error::Result;
use crate::record::{InventoryRecord, StockLevel, StockLine};
use crate::store::InventoryStore;

/// The inventory ledger.
///
/// Wraps an [`InventoryStore`] and emits notifications after a mutation has
/// committed. Emission is fire-and-forget: it can neither block the
/// operation beyond the emitter's timeout nor roll it back.
pub struct InventoryLedger<S, C> {
    store: S,
    emitter: NotificationEmitter<C>,
}

impl<S, C> InventoryLedger<S, C>
where
    S: InventoryStore,
    C: NotificationChannel,
{
    /// Creates a ledger over the given store and emitter.
    pub fn new(store: S, emitter: NotificationEmitter<C>) -> Self {
        Self { store, emitter }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates an inventory record for a new product with nothing reserved.
    #[tracing::instrument(skip(self))]
    pub async fn create_record(
        &self,
        product_id: ProductId,
        on_hand: u32,
        location: &str,
    ) -> Result<InventoryRecord> {
        let record = InventoryRecord::new(product_id, on_hand, location);
        self.store.create_record(record.clone()).await?;
        Ok(record)
    }

    /// Creates a fully specified record (reorder parameters, active flag).
    pub async fn create(&self, record: InventoryRecord) -> Result<()> {
        self.store.create_record(record).await
    }

    /// Loads a record, or None if the product is unknown.
    pub async fn get_record(&self, product_id: &ProductId) -> Result<Option<InventoryRecord>> {
        self.store.get_record(product_id).await
    }

    /// Pure availability check; no side effects.
    pub async fn verify_availability(&self, lines: &[StockLine]) -> Result<()> {
        self.store.verify_availability(lines).await
    }

    /// Reserves stock for an order; idempotent per order.
    ///
    /// After the reservation commits, emits a stock-reserved notification
    /// and a low-stock notification for every product whose availability
    /// dropped to its reorder threshold.
    #[tracing::instrument(skip(self))]
    pub async fn reserve(&self, order_id: OrderId, lines: &[StockLine]) -> Result<()> {
        let levels = self.store.reserve(order_id, lines).await?;
        metrics::counter!("stock_reservations_total").increment(1);
        tracing::info!(%order_id, items = lines.len(), "stock reserved");

        self.emitter
            .publish(Notification::StockReserved {
                order_id,
                product_ids: lines.iter().map(|l| l.product_id.clone()).collect(),
            })
            .await;
        self.notify_low_stock(&levels).await;
        Ok(())
    }

    /// Releases an order's hold; clamp-safe and idempotent.
    #[tracing::instrument(skip(self))]
    pub async fn release(&self, order_id: OrderId, lines: &[StockLine]) -> Result<()> {
        self.store.release(order_id, lines).await?;
        metrics::counter!("stock_releases_total").increment(1);
        tracing::info!(%order_id, "stock released");
        Ok(())
    }

    /// Consumes reserved stock on shipment.
    ///
    /// Emits an out-of-stock notification for every product whose on-hand
    /// count reached zero.
    #[tracing::instrument(skip(self))]
    pub async fn confirm(&self, order_id: OrderId, lines: &[StockLine]) -> Result<()> {
        let levels = self.store.confirm(order_id, lines).await?;
        metrics::counter!("stock_confirmations_total").increment(1);

        for level in &levels {
            if level.on_hand == 0 {
                self.emitter
                    .publish(Notification::OutOfStock {
                        product_id: level.product_id.clone(),
                    })
                    .await;
            }
        }
        Ok(())
    }

    /// Administrative on-hand correction.
    #[tracing::instrument(skip(self))]
    pub async fn adjust_stock(&self, product_id: &ProductId, new_on_hand: u32) -> Result<()> {
        self.store.adjust_stock(product_id, new_on_hand).await?;
        tracing::info!(%product_id, new_on_hand, "stock adjusted");
        Ok(())
    }

    /// Activates or deactivates a product for new reservations.
    pub async fn set_active(&self, product_id: &ProductId, active: bool) -> Result<()> {
        self.store.set_active(product_id, active).await
    }

    async fn notify_low_stock(&self, levels: &[StockLevel]) {
        for level in levels {
            if level.is_low() {
                self.emitter
                    .publish(Notification::LowStock {
                        product_id: level.product_id.clone(),
                        available: level.available(),
                        reorder_quantity: level.reorder_quantity,
                    })
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryInventoryStore;
    use notify::{EmitterConfig, FailingChannel, InMemoryChannel};

    fn ledger_with_channel() -> (
        InventoryLedger<InMemoryInventoryStore, InMemoryChannel>,
        InMemoryChannel,
    ) {
        let channel = InMemoryChannel::new();
        let emitter = NotificationEmitter::new(channel.clone(), EmitterConfig::default());
        (
            InventoryLedger::new(InMemoryInventoryStore::new(), emitter),
            channel,
        )
    }

    #[tokio::test]
    async fn reserve_emits_stock_reserved() {
        let (ledger, channel) = ledger_with_channel();
        ledger
            .create_record(ProductId::new("SKU-001"), 10, "WH-A")
            .await
            .unwrap();

        ledger
            .reserve(OrderId::new(), &[StockLine::new("SKU-001", 2)])
            .await
            .unwrap();

        assert_eq!(channel.count_of("StockReserved"), 1);
        assert_eq!(channel.count_of("LowStock"), 0);
    }

    #[tokio::test]
    async fn reserve_emits_low_stock_at_threshold() {
        let (ledger, channel) = ledger_with_channel();
        ledger
            .create(InventoryRecord::new("SKU-001", 10, "WH-A").with_reorder(3, 50))
            .await
            .unwrap();

        ledger
            .reserve(OrderId::new(), &[StockLine::new("SKU-001", 8)])
            .await
            .unwrap();

        assert_eq!(channel.count_of("LowStock"), 1);
    }

    #[tokio::test]
    async fn confirm_to_zero_emits_out_of_stock() {
        let (ledger, channel) = ledger_with_channel();
        ledger
            .create_record(ProductId::new("SKU-001"), 4, "WH-A")
            .await
            .unwrap();

        let order = OrderId::new();
        ledger
            .reserve(order, &[StockLine::new("SKU-001", 4)])
            .await
            .unwrap();
        ledger
            .confirm(order, &[StockLine::new("SKU-001", 4)])
            .await
            .unwrap();

        assert_eq!(channel.count_of("OutOfStock"), 1);
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_the_operation() {
        let emitter = NotificationEmitter::new(FailingChannel, EmitterConfig::default());
        let ledger = InventoryLedger::new(InMemoryInventoryStore::new(), emitter);
        ledger
            .create_record(ProductId::new("SKU-001"), 10, "WH-A")
            .await
            .unwrap();

        // Reservation commits even though every notification is dropped.
        ledger
            .reserve(OrderId::new(), &[StockLine::new("SKU-001", 8)])
            .await
            .unwrap();

        let record = ledger
            .get_record(&ProductId::new("SKU-001"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.reserved, 8);
    }
}
