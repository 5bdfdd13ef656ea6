use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{pooled_connection::bb8::Pool, AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use super::{release_in, reserve_in, LedgerTx, ReleaseOutcome, ReserveOutcome, StockLedger};
use crate::error::LedgerError;
use crate::models::{Inventory, InventoryLevels, NewReservation, Product};
use crate::schema::*;

pub type DbPool = Pool<AsyncPgConnection>;

/// Postgres ledger. Each reserve/release runs in its own serializable
/// transaction and locks the inventory row with `SELECT ... FOR UPDATE`.
#[derive(Clone)]
pub struct PgLedger {
    pool: DbPool,
}

struct PgTx<'c> {
    conn: &'c mut AsyncPgConnection,
}

impl PgLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Inserts a catalog product. Returns false if it already existed.
    pub async fn insert_product(&self, product: &Product) -> Result<bool, LedgerError> {
        let mut conn = self.pool.get().await?;
        let inserted = diesel::insert_into(products::table)
            .values(product)
            .on_conflict_do_nothing()
            .execute(&mut conn)
            .await?;
        Ok(inserted > 0)
    }

    /// Inserts an inventory row. Returns false if the product already had one.
    pub async fn insert_inventory(&self, row: &Inventory) -> Result<bool, LedgerError> {
        let mut conn = self.pool.get().await?;
        let inserted = diesel::insert_into(inventory::table)
            .values(row)
            .on_conflict_do_nothing()
            .execute(&mut conn)
            .await?;
        Ok(inserted > 0)
    }
}

#[async_trait]
impl StockLedger for PgLedger {
    async fn levels(&self, product_id: &str) -> Result<Option<InventoryLevels>, LedgerError> {
        let mut conn = self.pool.get().await?;
        let levels = inventory::table
            .filter(inventory::product_id.eq(product_id))
            .select((inventory::quantity, inventory::reserved))
            .first::<InventoryLevels>(&mut conn)
            .await
            .optional()?;
        Ok(levels)
    }

    async fn reserve(
        &self,
        product_id: &str,
        quantity: i32,
        order_id: Uuid,
    ) -> Result<ReserveOutcome, LedgerError> {
        let mut conn = self.pool.get().await?;
        let product_id = product_id.to_string();

        conn.build_transaction()
            .serializable()
            .run::<_, LedgerError, _>(|conn| {
                async move {
                    let mut tx = PgTx { conn };
                    reserve_in(&mut tx, &product_id, quantity, order_id).await
                }
                .scope_boxed()
            })
            .await
    }

    async fn release(
        &self,
        product_id: &str,
        quantity: i32,
        order_id: Uuid,
    ) -> Result<ReleaseOutcome, LedgerError> {
        let mut conn = self.pool.get().await?;
        let product_id = product_id.to_string();

        conn.build_transaction()
            .serializable()
            .run::<_, LedgerError, _>(|conn| {
                async move {
                    let mut tx = PgTx { conn };
                    release_in(&mut tx, &product_id, quantity, order_id).await
                }
                .scope_boxed()
            })
            .await
    }
}

#[async_trait]
impl LedgerTx for PgTx<'_> {
    async fn lock_inventory(
        &mut self,
        product_id: &str,
    ) -> Result<Option<InventoryLevels>, LedgerError> {
        let levels = inventory::table
            .filter(inventory::product_id.eq(product_id))
            .select((inventory::quantity, inventory::reserved))
            .for_update()
            .first::<InventoryLevels>(&mut *self.conn)
            .await
            .optional()?;
        Ok(levels)
    }

    async fn reservation(&mut self, order_id: Uuid, product_id: &str) -> Result<i32, LedgerError> {
        let held = reservations::table
            .filter(reservations::order_id.eq(order_id))
            .filter(reservations::product_id.eq(product_id))
            .select(reservations::quantity)
            .first::<i32>(&mut *self.conn)
            .await
            .optional()?;
        Ok(held.unwrap_or(0))
    }

    async fn adjust_reserved(
        &mut self,
        product_id: &str,
        delta: i32,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        diesel::update(inventory::table.filter(inventory::product_id.eq(product_id)))
            .set((
                inventory::reserved.eq(inventory::reserved + delta),
                inventory::updated_at.eq(at),
            ))
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    async fn put_reservation(
        &mut self,
        order_id: Uuid,
        product_id: &str,
        quantity: i32,
    ) -> Result<(), LedgerError> {
        let row = NewReservation {
            order_id,
            product_id,
            quantity,
        };

        diesel::insert_into(reservations::table)
            .values(&row)
            .on_conflict((reservations::order_id, reservations::product_id))
            .do_update()
            .set(reservations::quantity.eq(quantity))
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    async fn remove_reservation(
        &mut self,
        order_id: Uuid,
        product_id: &str,
    ) -> Result<(), LedgerError> {
        diesel::delete(
            reservations::table
                .filter(reservations::order_id.eq(order_id))
                .filter(reservations::product_id.eq(product_id)),
        )
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }
}
