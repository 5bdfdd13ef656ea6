use async_trait::async_trait;
use shared::{StockError, StockReservations};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ledger::StockLedger;
use crate::retry::RetryPolicy;

/// Checks, reserves and releases stock on top of a [`StockLedger`].
///
/// The engine is the only writer of inventory and reservation rows. It validates
/// requests, retries serialization conflicts with backoff, and translates
/// ledger failures into [`StockError`].
pub struct ReservationEngine<L> {
    ledger: L,
    retry: RetryPolicy,
}

impl<L: StockLedger> ReservationEngine<L> {
    pub fn new(ledger: L, retry: RetryPolicy) -> Self {
        Self { ledger, retry }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Advisory only: returns false when the product has no inventory row.
    pub async fn check_availability(&self, product_id: &str, quantity: i32) -> Result<bool, StockError> {
        validate_product(product_id, quantity)?;

        let levels = self
            .ledger
            .levels(product_id)
            .await
            .map_err(|e| e.into_stock_error(product_id))?;

        let available = levels.map(|l| l.available() >= quantity).unwrap_or(false);
        debug!(product_id, quantity, available, "checked stock");
        Ok(available)
    }

    pub async fn reserve(&self, product_id: &str, quantity: i32, order_id: Uuid) -> Result<(), StockError> {
        validate_product(product_id, quantity)?;
        validate_order(order_id)?;

        let outcome = self
            .retry
            .run("reserve", || self.ledger.reserve(product_id, quantity, order_id))
            .await;

        match outcome {
            Ok(outcome) => {
                info!(
                    product_id,
                    %order_id,
                    quantity,
                    previous = outcome.previous,
                    delta = outcome.delta,
                    "stock reserved"
                );
                Ok(())
            }
            Err(e) => {
                let err = e.into_stock_error(product_id);
                warn!(product_id, %order_id, quantity, error = %err, "reservation rejected");
                Err(err)
            }
        }
    }

    pub async fn release(&self, product_id: &str, quantity: i32, order_id: Uuid) -> Result<(), StockError> {
        validate_product(product_id, quantity)?;
        validate_order(order_id)?;

        let outcome = self
            .retry
            .run("release", || self.ledger.release(product_id, quantity, order_id))
            .await;

        match outcome {
            Ok(outcome) if outcome.released == 0 => {
                debug!(product_id, %order_id, quantity, "nothing held, release is a no-op");
                Ok(())
            }
            Ok(outcome) => {
                info!(
                    product_id,
                    %order_id,
                    released = outcome.released,
                    remaining = outcome.remaining,
                    "stock released"
                );
                Ok(())
            }
            Err(e) => {
                let err = e.into_stock_error(product_id);
                warn!(product_id, %order_id, quantity, error = %err, "release failed");
                Err(err)
            }
        }
    }
}

fn validate_product(product_id: &str, quantity: i32) -> Result<(), StockError> {
    if product_id.trim().is_empty() {
        return Err(StockError::validation("product ID is required"));
    }
    if quantity <= 0 {
        return Err(StockError::validation("quantity must be positive"));
    }
    Ok(())
}

fn validate_order(order_id: Uuid) -> Result<(), StockError> {
    if order_id.is_nil() {
        return Err(StockError::validation("order ID is required"));
    }
    Ok(())
}

#[async_trait]
impl<L: StockLedger> StockReservations for ReservationEngine<L> {
    async fn check_stock(&self, product_id: &str, quantity: i32) -> Result<bool, StockError> {
        self.check_availability(product_id, quantity).await
    }

    async fn reserve_stock(
        &self,
        product_id: &str,
        quantity: i32,
        order_id: Uuid,
    ) -> Result<(), StockError> {
        self.reserve(product_id, quantity, order_id).await
    }

    async fn release_stock(
        &self,
        product_id: &str,
        quantity: i32,
        order_id: Uuid,
    ) -> Result<(), StockError> {
        self.release(product_id, quantity, order_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use std::time::Duration;

    async fn engine_with(product_id: &str, quantity: i32) -> ReservationEngine<MemoryLedger> {
        let ledger = MemoryLedger::new();
        ledger.stock(product_id, quantity).await;
        ReservationEngine::new(
            ledger,
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
            },
        )
    }

    #[tokio::test]
    async fn check_is_false_for_unknown_product() {
        let engine = engine_with("prod-001", 5).await;
        assert!(!engine.check_availability("prod-404", 1).await.unwrap());
        assert!(engine.check_availability("prod-001", 5).await.unwrap());
        assert!(!engine.check_availability("prod-001", 6).await.unwrap());
    }

    #[tokio::test]
    async fn rejects_malformed_requests_without_touching_the_ledger() {
        let engine = engine_with("prod-001", 5).await;

        let err = engine.reserve("", 1, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err, StockError::validation("product ID is required"));

        let err = engine.reserve("prod-001", 0, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err, StockError::validation("quantity must be positive"));

        let err = engine.release("prod-001", 1, Uuid::nil()).await.unwrap_err();
        assert_eq!(err, StockError::validation("order ID is required"));

        assert_eq!(engine.ledger().reservation_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let engine = engine_with("prod-001", 5).await;
        let err = engine.reserve("prod-404", 1, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(
            err,
            StockError::NotFound {
                product_id: "prod-404".to_string()
            }
        );
    }

    #[tokio::test]
    async fn conflicts_are_retried_until_success() {
        let engine = engine_with("prod-001", 5).await;
        engine.ledger().inject_conflicts(2).await;
        let order_id = Uuid::new_v4();

        engine.reserve("prod-001", 2, order_id).await.unwrap();
        assert_eq!(engine.ledger().reservation_of(order_id, "prod-001").await, 2);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_conflict() {
        let engine = engine_with("prod-001", 5).await;
        engine.ledger().inject_conflicts(3).await;

        let err = engine.reserve("prod-001", 2, Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
