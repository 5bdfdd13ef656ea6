pub mod api;
pub mod error;
pub mod inventory_client;
pub mod models;
pub mod recovery;
pub mod saga;
pub mod schema;
pub mod store;

pub use error::{OrderError, StoreError};
pub use inventory_client::KafkaStockClient;
pub use saga::OrderSaga;
pub use store::{MemoryOrderStore, OrderStore, PgOrderStore};
