//! Durable storage for orders and their line items.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Order, OrderStatus};

mod memory;
mod postgres;

pub use memory::MemoryOrderStore;
pub use postgres::{DbPool, PgOrderStore};

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists the order and all of its items in one transaction.
    async fn create(&self, order: &Order) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    /// All orders, newest first.
    async fn list(&self) -> Result<Vec<Order>, StoreError>;

    /// Moves the order from `from` to `to`, stamping `updated_at`.
    ///
    /// Returns false without writing anything when the order is not in `from`.
    async fn transition(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, StoreError>;

    /// Pending orders created before `cutoff`, oldest first.
    async fn stale_pending(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, StoreError>;
}
