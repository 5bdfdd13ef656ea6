use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{release_in, reserve_in, LedgerTx, ReleaseOutcome, ReserveOutcome, StockLedger};
use crate::error::LedgerError;
use crate::models::{Inventory, InventoryLevels};

/// In-process ledger with the same transactional semantics as [`super::PgLedger`].
///
/// One async mutex serializes all transactions. A transaction works on a copy of
/// the rows which replaces the shared state only when every step succeeded.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    shared: Arc<Mutex<Shared>>,
}

#[derive(Debug, Default)]
struct Shared {
    rows: LedgerRows,
    pending_conflicts: u32,
}

#[derive(Debug, Clone, Default)]
struct LedgerRows {
    inventory: HashMap<String, Inventory>,
    reservations: HashMap<(Uuid, String), i32>,
}

struct MemoryTx {
    rows: LedgerRows,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces the inventory row for a product with nothing reserved.
    pub async fn stock(&self, product_id: &str, quantity: i32) {
        let mut shared = self.shared.lock().await;
        shared.rows.inventory.insert(
            product_id.to_string(),
            Inventory {
                product_id: product_id.to_string(),
                quantity,
                reserved: 0,
                updated_at: Utc::now(),
            },
        );
    }

    pub async fn reservation_of(&self, order_id: Uuid, product_id: &str) -> i32 {
        let shared = self.shared.lock().await;
        shared
            .rows
            .reservations
            .get(&(order_id, product_id.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub async fn reservation_count(&self) -> usize {
        self.shared.lock().await.rows.reservations.len()
    }

    /// Makes the next `count` transactions abort with a serialization conflict.
    pub async fn inject_conflicts(&self, count: u32) {
        self.shared.lock().await.pending_conflicts = count;
    }

    /// Opens a transaction: takes the ledger lock and snapshots the rows.
    async fn begin(&self) -> Result<(MutexGuard<'_, Shared>, MemoryTx), LedgerError> {
        let mut shared = self.shared.lock().await;
        if shared.pending_conflicts > 0 {
            shared.pending_conflicts -= 1;
            return Err(LedgerError::Conflict);
        }

        let tx = MemoryTx {
            rows: shared.rows.clone(),
        };
        Ok((shared, tx))
    }
}

impl MemoryTx {
    fn commit(self, shared: &mut Shared) {
        shared.rows = self.rows;
    }
}

#[async_trait]
impl StockLedger for MemoryLedger {
    async fn levels(&self, product_id: &str) -> Result<Option<InventoryLevels>, LedgerError> {
        let shared = self.shared.lock().await;
        Ok(shared.rows.inventory.get(product_id).map(InventoryLevels::from))
    }

    async fn reserve(
        &self,
        product_id: &str,
        quantity: i32,
        order_id: Uuid,
    ) -> Result<ReserveOutcome, LedgerError> {
        let (mut shared, mut tx) = self.begin().await?;
        let outcome = reserve_in(&mut tx, product_id, quantity, order_id).await?;
        tx.commit(&mut shared);
        Ok(outcome)
    }

    async fn release(
        &self,
        product_id: &str,
        quantity: i32,
        order_id: Uuid,
    ) -> Result<ReleaseOutcome, LedgerError> {
        let (mut shared, mut tx) = self.begin().await?;
        let outcome = release_in(&mut tx, product_id, quantity, order_id).await?;
        tx.commit(&mut shared);
        Ok(outcome)
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn lock_inventory(
        &mut self,
        product_id: &str,
    ) -> Result<Option<InventoryLevels>, LedgerError> {
        Ok(self.rows.inventory.get(product_id).map(InventoryLevels::from))
    }

    async fn reservation(&mut self, order_id: Uuid, product_id: &str) -> Result<i32, LedgerError> {
        Ok(self
            .rows
            .reservations
            .get(&(order_id, product_id.to_string()))
            .copied()
            .unwrap_or(0))
    }

    async fn adjust_reserved(
        &mut self,
        product_id: &str,
        delta: i32,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let Some(row) = self.rows.inventory.get_mut(product_id) else {
            return Ok(());
        };

        // Mirrors the inventory_reserved_bounds check constraint.
        let reserved = row.reserved + delta;
        if reserved < 0 || reserved > row.quantity {
            return Err(LedgerError::Database(DieselError::DatabaseError(
                DatabaseErrorKind::CheckViolation,
                Box::new(format!(
                    "reserved {reserved} out of bounds for quantity {}",
                    row.quantity
                )),
            )));
        }

        row.reserved = reserved;
        row.updated_at = at;
        Ok(())
    }

    async fn put_reservation(
        &mut self,
        order_id: Uuid,
        product_id: &str,
        quantity: i32,
    ) -> Result<(), LedgerError> {
        self.rows
            .reservations
            .insert((order_id, product_id.to_string()), quantity);
        Ok(())
    }

    async fn remove_reservation(
        &mut self,
        order_id: Uuid,
        product_id: &str,
    ) -> Result<(), LedgerError> {
        self.rows
            .reservations
            .remove(&(order_id, product_id.to_string()));
        Ok(())
    }
}
