//! The stock ledger: per-product inventory counts and per-order reservations.
//!
//! Every mutation happens inside one serializable transaction that holds the
//! product's inventory row lock. The step logic lives here once, written against
//! [`LedgerTx`]; backends only provide the transaction and the row primitives.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::models::InventoryLevels;

mod memory;
mod postgres;

pub use memory::MemoryLedger;
pub use postgres::PgLedger;

/// Row operations available inside an open ledger transaction.
///
/// Returning `Err` from any step aborts the whole transaction.
#[async_trait]
pub trait LedgerTx: Send {
    /// Locks and reads the inventory row, `None` if the product has none.
    async fn lock_inventory(&mut self, product_id: &str)
        -> Result<Option<InventoryLevels>, LedgerError>;

    /// Units currently held by the order, 0 when it holds none.
    async fn reservation(&mut self, order_id: Uuid, product_id: &str) -> Result<i32, LedgerError>;

    async fn adjust_reserved(
        &mut self,
        product_id: &str,
        delta: i32,
        at: DateTime<Utc>,
    ) -> Result<(), LedgerError>;

    /// Inserts or overwrites the reservation with an absolute quantity.
    async fn put_reservation(
        &mut self,
        order_id: Uuid,
        product_id: &str,
        quantity: i32,
    ) -> Result<(), LedgerError>;

    async fn remove_reservation(&mut self, order_id: Uuid, product_id: &str)
        -> Result<(), LedgerError>;
}

/// Storage backend for the reservation engine.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Unlocked read of the inventory row.
    async fn levels(&self, product_id: &str) -> Result<Option<InventoryLevels>, LedgerError>;

    async fn reserve(
        &self,
        product_id: &str,
        quantity: i32,
        order_id: Uuid,
    ) -> Result<ReserveOutcome, LedgerError>;

    async fn release(
        &self,
        product_id: &str,
        quantity: i32,
        order_id: Uuid,
    ) -> Result<ReleaseOutcome, LedgerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveOutcome {
    /// Units the order held before this call.
    pub previous: i32,
    /// Units newly added to the product's reserved counter.
    pub delta: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseOutcome {
    pub released: i32,
    /// Units the order still holds afterwards.
    pub remaining: i32,
}

/// Sets the order's hold on `product_id` to exactly `quantity`.
///
/// Repeating the call with the same arguments computes a zero delta and
/// leaves the ledger untouched. Availability is checked against the delta, so
/// units the order already holds count toward its own request, and a shortage
/// reports the delta as the requested amount.
pub async fn reserve_in<T: LedgerTx + ?Sized>(
    tx: &mut T,
    product_id: &str,
    quantity: i32,
    order_id: Uuid,
) -> Result<ReserveOutcome, LedgerError> {
    let levels = tx
        .lock_inventory(product_id)
        .await?
        .ok_or_else(|| LedgerError::NotFound(product_id.to_string()))?;

    let previous = tx.reservation(order_id, product_id).await?;
    let delta = quantity - previous;
    if delta < 0 {
        return Err(LedgerError::InvalidReservation {
            held: previous,
            requested: quantity,
        });
    }

    let available = levels.available();
    if available < delta {
        return Err(LedgerError::InsufficientStock {
            available,
            requested: delta,
        });
    }

    if delta > 0 {
        tx.adjust_reserved(product_id, delta, Utc::now()).await?;
    }
    tx.put_reservation(order_id, product_id, quantity).await?;

    Ok(ReserveOutcome { previous, delta })
}

/// Gives back at most what the order holds; releasing nothing is a success.
pub async fn release_in<T: LedgerTx + ?Sized>(
    tx: &mut T,
    product_id: &str,
    quantity: i32,
    order_id: Uuid,
) -> Result<ReleaseOutcome, LedgerError> {
    tx.lock_inventory(product_id)
        .await?
        .ok_or_else(|| LedgerError::NotFound(product_id.to_string()))?;

    let held = tx.reservation(order_id, product_id).await?;
    let released = quantity.min(held);
    if released <= 0 {
        return Ok(ReleaseOutcome {
            released: 0,
            remaining: held,
        });
    }

    tx.adjust_reserved(product_id, -released, Utc::now()).await?;

    let remaining = held - released;
    if remaining == 0 {
        tx.remove_reservation(order_id, product_id).await?;
    } else {
        tx.put_reservation(order_id, product_id, remaining).await?;
    }

    Ok(ReleaseOutcome {
        released,
        remaining,
    })
}
