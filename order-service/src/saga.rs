use bigdecimal::BigDecimal;
use chrono::Utc;
use shared::{StockError, StockReservations};
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::OrderError;
use crate::models::{CreateOrderRequest, Order, OrderStatus};
use crate::store::OrderStore;

/// Drives an order from `pending` to `confirmed` or `rejected`, reserving each
/// line item through the inventory capability and compensating on failure.
pub struct OrderSaga<S, R> {
    store: S,
    stock: R,
    stock_timeout: Duration,
}

impl<S: OrderStore, R: StockReservations> OrderSaga<S, R> {
    pub fn new(store: S, stock: R, stock_timeout: Duration) -> Self {
        Self {
            store,
            stock,
            stock_timeout,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, OrderError> {
        validate(&request)?;

        let order = Order::pending(&request);
        self.store.create(&order).await?;
        info!(
            order_id = %order.id,
            user_id = %order.user_id,
            items = order.items.len(),
            "order persisted as pending"
        );

        let mut failures = Vec::new();
        for item in &order.items {
            let reserved = self
                .bounded(
                    self.stock
                        .reserve_stock(&item.product_id, item.quantity, order.id),
                )
                .await;
            if let Err(e) = reserved {
                warn!(
                    order_id = %order.id,
                    product_id = %item.product_id,
                    quantity = item.quantity,
                    error = %e,
                    "reservation failed"
                );
                failures.push(e);
            }
        }

        if let Some(first) = failures.into_iter().next() {
            self.compensate(&order).await;
            if !self
                .store
                .transition(order.id, OrderStatus::Pending, OrderStatus::Rejected)
                .await?
            {
                debug!(order_id = %order.id, "order was already finalized during rejection");
            }
            info!(order_id = %order.id, reason = %first, "order rejected");
            return Err(OrderError::Reservation(first));
        }

        if !self
            .store
            .transition(order.id, OrderStatus::Pending, OrderStatus::Confirmed)
            .await?
        {
            // Reconciliation rejected the order while we were reserving.
            warn!(order_id = %order.id, "order finalized elsewhere, releasing reservations");
            self.compensate(&order).await;
            return Err(OrderError::NoLongerPending(order.id));
        }

        info!(order_id = %order.id, "order confirmed");
        self.get_order(order.id).await
    }

    pub async fn get_order(&self, id: Uuid) -> Result<Order, OrderError> {
        self.store.get(id).await?.ok_or(OrderError::NotFound(id))
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>, OrderError> {
        Ok(self.store.list().await?)
    }

    /// Rejects pending orders created more than `older_than` ago and releases
    /// their stock. Returns how many orders were rejected.
    pub async fn reconcile_stale(&self, older_than: chrono::Duration) -> Result<usize, OrderError> {
        let cutoff = Utc::now() - older_than;
        let stale = self.store.stale_pending(cutoff).await?;
        let mut rejected = 0;

        for order in stale {
            if !self
                .store
                .transition(order.id, OrderStatus::Pending, OrderStatus::Rejected)
                .await?
            {
                continue;
            }
            info!(order_id = %order.id, created_at = %order.created_at, "rejected stale pending order");
            let unreleased = self.compensate(&order).await;
            if !unreleased.is_empty() {
                // The order is terminal now, later sweeps will not revisit it.
                error!(
                    order_id = %order.id,
                    products = ?unreleased,
                    "stock still reserved by rejected order"
                );
            }
            rejected += 1;
        }

        Ok(rejected)
    }

    /// Releases every item of the order and returns the products whose release
    /// failed. Failures are logged, never raised.
    async fn compensate(&self, order: &Order) -> Vec<String> {
        let mut unreleased = Vec::new();
        for item in &order.items {
            let released = self
                .bounded(
                    self.stock
                        .release_stock(&item.product_id, item.quantity, order.id),
                )
                .await;
            if let Err(e) = released {
                warn!(
                    order_id = %order.id,
                    product_id = %item.product_id,
                    error = %e,
                    "compensating release failed"
                );
                unreleased.push(item.product_id.clone());
            }
        }
        unreleased
    }

    async fn bounded<F>(&self, call: F) -> Result<(), StockError>
    where
        F: Future<Output = Result<(), StockError>>,
    {
        match tokio::time::timeout(self.stock_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StockError::Timeout {
                after_ms: self.stock_timeout.as_millis() as u64,
            }),
        }
    }
}

fn validate(request: &CreateOrderRequest) -> Result<(), OrderError> {
    if request.user_id.trim().is_empty() {
        return Err(OrderError::Validation("user ID is required".to_string()));
    }
    if request.items.is_empty() {
        return Err(OrderError::Validation(
            "at least one item is required".to_string(),
        ));
    }

    let zero = BigDecimal::from(0);
    let mut seen = HashSet::new();
    for (i, item) in request.items.iter().enumerate() {
        if item.product_id.trim().is_empty() {
            return Err(OrderError::Validation(format!(
                "product ID is required for item {i}"
            )));
        }
        // Reservations are keyed by (order, product), one line per product.
        if !seen.insert(item.product_id.as_str()) {
            return Err(OrderError::Validation(format!(
                "duplicate product ID {} for item {i}",
                item.product_id
            )));
        }
        if item.quantity <= 0 {
            return Err(OrderError::Validation(format!(
                "quantity must be positive for item {i}"
            )));
        }
        if item.price <= zero {
            return Err(OrderError::Validation(format!(
                "price must be positive for item {i}"
            )));
        }
    }
    Ok(())
}
