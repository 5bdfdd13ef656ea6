use shared::StockReservations;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{error, info};

use crate::error::OrderError;
use crate::saga::OrderSaga;
use crate::store::OrderStore;

/// Periodically rejects orders left `pending` by a crashed saga.
pub struct ReconciliationWorker<S, R> {
    saga: Arc<OrderSaga<S, R>>,
    every: Duration,
    stale_after: chrono::Duration,
}

impl<S: OrderStore, R: StockReservations> ReconciliationWorker<S, R> {
    pub fn new(saga: Arc<OrderSaga<S, R>>, every: Duration, stale_after: chrono::Duration) -> Self {
        Self {
            saga,
            every,
            stale_after,
        }
    }

    pub async fn run(&self) {
        let mut interval = time::interval(self.every);

        loop {
            interval.tick().await;

            if let Err(e) = self.sweep().await {
                error!("Error reconciling stale orders: {}", e);
            }
        }
    }

    pub async fn sweep(&self) -> Result<usize, OrderError> {
        let rejected = self.saga.reconcile_stale(self.stale_after).await?;
        if rejected > 0 {
            info!(rejected, "Reconciled stale pending orders");
        }
        Ok(rejected)
    }
}
