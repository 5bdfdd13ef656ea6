use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::OrderStore;
use crate::error::StoreError;
use crate::models::{Order, OrderStatus};

/// Order store kept in process memory; used by tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryOrderStore {
    orders: Arc<Mutex<HashMap<Uuid, Order>>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an order as-is, bypassing the saga.
    pub fn insert(&self, order: Order) {
        self.orders.lock().insert(order.id, order);
    }

    pub fn status_of(&self, id: Uuid) -> Option<OrderStatus> {
        self.orders.lock().get(&id).map(|order| order.status)
    }

    pub fn is_empty(&self) -> bool {
        self.orders.lock().is_empty()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn create(&self, order: &Order) -> Result<(), StoreError> {
        let mut orders = self.orders.lock();
        if orders.contains_key(&order.id) {
            return Err(StoreError::Corrupt(format!("duplicate order id {}", order.id)));
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.lock().get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = self.orders.lock().values().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn transition(
        &self,
        id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, StoreError> {
        let mut orders = self.orders.lock();
        match orders.get_mut(&id) {
            Some(order) if order.status == from => {
                order.status = to;
                order.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn stale_pending(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, StoreError> {
        let mut stale: Vec<Order> = self
            .orders
            .lock()
            .values()
            .filter(|order| order.status == OrderStatus::Pending && order.created_at < cutoff)
            .cloned()
            .collect();
        stale.sort_by_key(|order| order.created_at);
        Ok(stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateOrderRequest, OrderItemRequest};
    use bigdecimal::BigDecimal;
    use chrono::Duration;

    fn order_created_at(created_at: DateTime<Utc>) -> Order {
        let mut order = Order::pending(&CreateOrderRequest {
            user_id: "user-1".to_string(),
            items: vec![OrderItemRequest {
                product_id: "prod-001".to_string(),
                quantity: 1,
                price: BigDecimal::from(5),
            }],
        });
        order.created_at = created_at;
        order.updated_at = created_at;
        order
    }

    #[tokio::test]
    async fn transition_only_applies_from_the_expected_status() {
        let store = MemoryOrderStore::new();
        let order = order_created_at(Utc::now());
        store.create(&order).await.unwrap();

        assert!(store
            .transition(order.id, OrderStatus::Pending, OrderStatus::Rejected)
            .await
            .unwrap());
        assert!(!store
            .transition(order.id, OrderStatus::Pending, OrderStatus::Confirmed)
            .await
            .unwrap());
        assert_eq!(store.status_of(order.id), Some(OrderStatus::Rejected));
    }

    #[tokio::test]
    async fn list_returns_newest_first() {
        let store = MemoryOrderStore::new();
        let now = Utc::now();
        let old = order_created_at(now - Duration::minutes(5));
        let new = order_created_at(now);
        store.create(&old).await.unwrap();
        store.create(&new).await.unwrap();

        let ids: Vec<Uuid> = store.list().await.unwrap().iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![new.id, old.id]);
    }

    #[tokio::test]
    async fn stale_pending_skips_recent_and_finalized_orders() {
        let store = MemoryOrderStore::new();
        let now = Utc::now();
        let stale = order_created_at(now - Duration::minutes(30));
        let mut finalized = order_created_at(now - Duration::minutes(30));
        finalized.status = OrderStatus::Confirmed;
        let recent = order_created_at(now);
        store.insert(stale.clone());
        store.insert(finalized);
        store.insert(recent);

        let found = store.stale_pending(now - Duration::minutes(10)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, stale.id);
    }
}
