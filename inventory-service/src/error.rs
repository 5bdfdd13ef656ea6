use diesel::result::{DatabaseErrorKind, Error as DieselError};
use shared::StockError;
use thiserror::Error;

/// Why a ledger transaction was aborted.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("no inventory row for product {0}")]
    NotFound(String),

    #[error("insufficient stock: available {available}, requested {requested}")]
    InsufficientStock { available: i32, requested: i32 },

    #[error("order already holds {held}, cannot reserve {requested}")]
    InvalidReservation { held: i32, requested: i32 },

    #[error("serialization conflict")]
    Conflict,

    #[error("database error: {0}")]
    Database(DieselError),

    #[error("connection pool error: {0}")]
    Pool(String),
}

impl From<DieselError> for LedgerError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => {
                LedgerError::Conflict
            }
            other => LedgerError::Database(other),
        }
    }
}

impl<E: std::error::Error + 'static> From<bb8::RunError<E>> for LedgerError {
    fn from(err: bb8::RunError<E>) -> Self {
        LedgerError::Pool(err.to_string())
    }
}

impl LedgerError {
    pub fn into_stock_error(self, product_id: &str) -> StockError {
        let product_id = product_id.to_string();
        match self {
            LedgerError::NotFound(_) => StockError::NotFound { product_id },
            LedgerError::InsufficientStock {
                available,
                requested,
            } => StockError::InsufficientStock {
                product_id,
                available,
                requested,
            },
            LedgerError::InvalidReservation { held, requested } => StockError::InvalidReservation {
                product_id,
                held,
                requested,
            },
            LedgerError::Conflict => StockError::TransactionConflict { product_id },
            LedgerError::Database(e) => StockError::Storage {
                message: e.to_string(),
            },
            LedgerError::Pool(message) => StockError::Storage { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_failures_become_conflicts() {
        let err = LedgerError::from(DieselError::DatabaseError(
            DatabaseErrorKind::SerializationFailure,
            Box::new("could not serialize access".to_string()),
        ));
        assert!(matches!(err, LedgerError::Conflict));
        assert!(err.into_stock_error("prod-001").is_retryable());
    }

    #[test]
    fn other_database_errors_are_storage_failures() {
        let err = LedgerError::from(DieselError::NotFound);
        assert!(matches!(
            err.into_stock_error("prod-001"),
            StockError::Storage { .. }
        ));
    }

    #[test]
    fn pool_errors_surface_as_storage_failures() {
        let err = LedgerError::from(bb8::RunError::User(
            diesel_async::pooled_connection::PoolError::QueryError(DieselError::NotFound),
        ));
        assert!(matches!(err, LedgerError::Pool(_)));
        assert!(matches!(
            err.into_stock_error("prod-001"),
            StockError::Storage { .. }
        ));

        let timed_out = LedgerError::from(
            bb8::RunError::<diesel_async::pooled_connection::PoolError>::TimedOut,
        );
        assert!(matches!(timed_out, LedgerError::Pool(_)));
    }
}
