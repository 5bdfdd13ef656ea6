use shared::StockError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("corrupt order row: {0}")]
    Corrupt(String),
}

impl<E: std::error::Error + 'static> From<bb8::RunError<E>> for StoreError {
    fn from(err: bb8::RunError<E>) -> Self {
        StoreError::Pool(err.to_string())
    }
}

/// Failures returned to callers of the order saga.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("order not found: {0}")]
    NotFound(Uuid),

    /// The first reservation failure; the order has been rejected.
    #[error("failed to reserve inventory: {0}")]
    Reservation(#[source] StockError),

    /// The order was finalized by someone else (reconciliation) mid-saga.
    #[error("order {0} is no longer pending")]
    NoLongerPending(Uuid),

    #[error("order store error: {0}")]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel_async::pooled_connection::PoolError;

    #[test]
    fn pool_failures_are_reported_as_pool_errors() {
        let err = StoreError::from(bb8::RunError::<PoolError>::TimedOut);
        assert!(matches!(err, StoreError::Pool(_)));

        let err = OrderError::from(StoreError::from(bb8::RunError::User(
            PoolError::QueryError(diesel::result::Error::NotFound),
        )));
        assert!(err.to_string().starts_with("order store error: connection pool error"));
    }
}
