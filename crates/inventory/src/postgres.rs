//! PostgreSQL-backed inventory store.
//!
//! Every mutating operation runs in a transaction and takes row-level locks
//! (`SELECT ... FOR UPDATE` or the implicit `UPDATE` lock) on the affected
//! records, acquired in sorted product order so concurrent multi-item
//! requests cannot deadlock.

use std::collections::HashMap;

use async_trait::async_trait;
use common::{OrderId, ProductId};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use crate::error::{InventoryError, Result};
use crate::record::{InventoryRecord, StockLevel, StockLine};
use crate::store::{InventoryStore, same_item_set, validate_lines};

/// PostgreSQL inventory store.
#[derive(Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
}

impl PostgresInventoryStore {
    /// Creates a store over the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_record(row: PgRow) -> Result<InventoryRecord> {
        Ok(InventoryRecord {
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            on_hand: row.try_get::<i64, _>("on_hand")? as u32,
            reserved: row.try_get::<i64, _>("reserved")? as u32,
            warehouse_location: row.try_get("warehouse_location")?,
            reorder_threshold: row.try_get::<i64, _>("reorder_threshold")? as u32,
            reorder_quantity: row.try_get::<i64, _>("reorder_quantity")? as u32,
            active: row.try_get("active")?,
        })
    }

    /// Locks and loads the records for all lines, in sorted product order.
    async fn lock_records(
        tx: &mut Transaction<'_, Postgres>,
        lines: &[StockLine],
    ) -> Result<HashMap<ProductId, InventoryRecord>> {
        let mut sorted: Vec<&StockLine> = lines.iter().collect();
        sorted.sort_by(|a, b| a.product_id.cmp(&b.product_id));

        let mut records = HashMap::with_capacity(lines.len());
        for line in sorted {
            let row = sqlx::query(
                "SELECT product_id, on_hand, reserved, warehouse_location, \
                 reorder_threshold, reorder_quantity, active \
                 FROM inventory_records WHERE product_id = $1 FOR UPDATE",
            )
            .bind(line.product_id.as_str())
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| InventoryError::NotFound(line.product_id.clone()))?;

            records.insert(line.product_id.clone(), Self::row_to_record(row)?);
        }
        Ok(records)
    }

    /// Loads the remaining hold lines for an order, locking them.
    async fn lock_hold(
        tx: &mut Transaction<'_, Postgres>,
        order_id: OrderId,
    ) -> Result<HashMap<ProductId, (u32, u32)>> {
        let rows = sqlx::query(
            "SELECT product_id, requested, remaining FROM inventory_holds \
             WHERE order_id = $1 ORDER BY product_id FOR UPDATE",
        )
        .bind(order_id.as_uuid())
        .fetch_all(&mut **tx)
        .await?;

        let mut hold = HashMap::with_capacity(rows.len());
        for row in rows {
            hold.insert(
                ProductId::new(row.try_get::<String, _>("product_id")?),
                (
                    row.try_get::<i64, _>("requested")? as u32,
                    row.try_get::<i64, _>("remaining")? as u32,
                ),
            );
        }
        Ok(hold)
    }

    fn check_line(record: &InventoryRecord, line: &StockLine) -> Result<()> {
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

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    async fn create_record(&self, record: InventoryRecord) -> Result<()> {
        if record.reserved != 0 {
            return Err(InventoryError::InvalidArgument(
                "new record must have nothing reserved".to_string(),
            ));
        }

        let result = sqlx::query(
            "INSERT INTO inventory_records \
             (product_id, on_hand, reserved, warehouse_location, \
              reorder_threshold, reorder_quantity, active) \
             VALUES ($1, $2, 0, $3, $4, $5, $6) \
             ON CONFLICT (product_id) DO NOTHING",
        )
        .bind(record.product_id.as_str())
        .bind(record.on_hand as i64)
        .bind(&record.warehouse_location)
        .bind(record.reorder_threshold as i64)
        .bind(record.reorder_quantity as i64)
        .bind(record.active)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(InventoryError::AlreadyExists(record.product_id));
        }
        Ok(())
    }

    async fn get_record(&self, product_id: &ProductId) -> Result<Option<InventoryRecord>> {
        let row = sqlx::query(
            "SELECT product_id, on_hand, reserved, warehouse_location, \
             reorder_threshold, reorder_quantity, active \
             FROM inventory_records WHERE product_id = $1",
        )
        .bind(product_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn verify_availability(&self, lines: &[StockLine]) -> Result<()> {
        validate_lines(lines)?;
        for line in lines {
            let record = self
                .get_record(&line.product_id)
                .await?
                .ok_or_else(|| InventoryError::NotFound(line.product_id.clone()))?;
            Self::check_line(&record, line)?;
        }
        Ok(())
    }

    async fn reserve(&self, order_id: OrderId, lines: &[StockLine]) -> Result<Vec<StockLevel>> {
        validate_lines(lines)?;
        let mut tx = self.pool.begin().await?;

        let hold = Self::lock_hold(&mut tx, order_id).await?;
        if !hold.is_empty() {
            let recorded: Vec<StockLine> = hold
                .iter()
                .map(|(product_id, (requested, _))| StockLine::new(product_id.clone(), *requested))
                .collect();
            if !same_item_set(&recorded, lines) {
                return Err(InventoryError::ReservationConflict(order_id));
            }
            // Identical replay: report current levels without moving counters.
            let records = Self::lock_records(&mut tx, lines).await?;
            let levels = lines
                .iter()
                .map(|l| records[&l.product_id].level())
                .collect();
            tx.commit().await?;
            return Ok(levels);
        }

        // Re-verify inside the transaction; the row locks close the window
        // between an outer availability check and this write.
        let records = Self::lock_records(&mut tx, lines).await?;
        for line in lines {
            Self::check_line(&records[&line.product_id], line)?;
        }

        let mut levels = Vec::with_capacity(lines.len());
        for line in lines {
            sqlx::query(
                "UPDATE inventory_records SET reserved = reserved + $1 WHERE product_id = $2",
            )
            .bind(line.quantity as i64)
            .bind(line.product_id.as_str())
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO inventory_holds (order_id, product_id, requested, remaining) \
                 VALUES ($1, $2, $3, $3)",
            )
            .bind(order_id.as_uuid())
            .bind(line.product_id.as_str())
            .bind(line.quantity as i64)
            .execute(&mut *tx)
            .await?;

            let mut record = records[&line.product_id].clone();
            record.reserved += line.quantity;
            levels.push(record.level());
        }

        tx.commit().await?;
        Ok(levels)
    }

    async fn release(&self, order_id: OrderId, lines: &[StockLine]) -> Result<()> {
        validate_lines(lines)?;
        let mut tx = self.pool.begin().await?;

        let hold = Self::lock_hold(&mut tx, order_id).await?;
        if hold.is_empty() {
            // Nothing held for this order; over-release is clamped, not an error.
            tx.commit().await?;
            return Ok(());
        }

        let mut sorted: Vec<&StockLine> = lines.iter().collect();
        sorted.sort_by(|a, b| a.product_id.cmp(&b.product_id));

        for line in sorted {
            let held = hold
                .get(&line.product_id)
                .map(|(_, remaining)| *remaining)
                .unwrap_or(0);
            let take = line.quantity.min(held);
            if take == 0 {
                continue;
            }

            let result = sqlx::query(
                "UPDATE inventory_records SET reserved = reserved - $1 WHERE product_id = $2",
            )
            .bind(take as i64)
            .bind(line.product_id.as_str())
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                return Err(InventoryError::NotFound(line.product_id.clone()));
            }

            sqlx::query(
                "UPDATE inventory_holds SET remaining = remaining - $1 \
                 WHERE order_id = $2 AND product_id = $3",
            )
            .bind(take as i64)
            .bind(order_id.as_uuid())
            .bind(line.product_id.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn confirm(&self, order_id: OrderId, lines: &[StockLine]) -> Result<Vec<StockLevel>> {
        validate_lines(lines)?;
        let mut tx = self.pool.begin().await?;

        let hold = Self::lock_hold(&mut tx, order_id).await?;
        if hold.is_empty() {
            tx.commit().await?;
            return Ok(Vec::new());
        }

        let records = Self::lock_records(&mut tx, lines).await?;

        let mut levels = Vec::with_capacity(lines.len());
        for line in lines {
            let held = hold
                .get(&line.product_id)
                .map(|(_, remaining)| *remaining)
                .unwrap_or(0);
            let take = line.quantity.min(held);

            let mut record = records[&line.product_id].clone();
            if take > 0 {
                sqlx::query(
                    "UPDATE inventory_records \
                     SET on_hand = on_hand - $1, reserved = reserved - $1 \
                     WHERE product_id = $2",
                )
                .bind(take as i64)
                .bind(line.product_id.as_str())
                .execute(&mut *tx)
                .await?;

                sqlx::query(
                    "UPDATE inventory_holds SET remaining = remaining - $1 \
                     WHERE order_id = $2 AND product_id = $3",
                )
                .bind(take as i64)
                .bind(order_id.as_uuid())
                .bind(line.product_id.as_str())
                .execute(&mut *tx)
                .await?;

                record.on_hand -= take;
                record.reserved -= take;
            }
            levels.push(record.level());
        }

        tx.commit().await?;
        Ok(levels)
    }

    async fn adjust_stock(&self, product_id: &ProductId, new_on_hand: u32) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT reserved FROM inventory_records WHERE product_id = $1 FOR UPDATE",
        )
        .bind(product_id.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| InventoryError::NotFound(product_id.clone()))?;

        let reserved = row.try_get::<i64, _>("reserved")? as u32;
        if new_on_hand < reserved {
            return Err(InventoryError::InvalidArgument(format!(
                "cannot shrink on-hand below reserved quantity ({reserved})"
            )));
        }

        sqlx::query("UPDATE inventory_records SET on_hand = $1 WHERE product_id = $2")
            .bind(new_on_hand as i64)
            .bind(product_id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn set_active(&self, product_id: &ProductId, active: bool) -> Result<()> {
        let result = sqlx::query("UPDATE inventory_records SET active = $1 WHERE product_id = $2")
            .bind(active)
            .bind(product_id.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(InventoryError::NotFound(product_id.clone()));
        }
        Ok(())
    }
}
