pub mod engine;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod retry;
pub mod schema;
pub mod seed;

pub use engine::ReservationEngine;
pub use error::LedgerError;
pub use ledger::{MemoryLedger, PgLedger, StockLedger};
pub use retry::RetryPolicy;
