use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

mod error;

pub use error::StockError;

/// Stock operations offered by the inventory service.
///
/// The order saga only ever talks to inventory through this trait, whether the
/// engine runs in-process or behind the command topic.
#[async_trait]
pub trait StockReservations: Send + Sync {
    /// Advisory availability query. Never used to gate a reservation.
    async fn check_stock(&self, product_id: &str, quantity: i32) -> Result<bool, StockError>;

    /// Sets the units held by `order_id` for `product_id` to `quantity`.
    async fn reserve_stock(
        &self,
        product_id: &str,
        quantity: i32,
        order_id: Uuid,
    ) -> Result<(), StockError>;

    /// Gives back up to `quantity` units held by `order_id`.
    async fn release_stock(
        &self,
        product_id: &str,
        quantity: i32,
        order_id: Uuid,
    ) -> Result<(), StockError>;
}

#[async_trait]
impl<T: StockReservations + ?Sized> StockReservations for Arc<T> {
    async fn check_stock(&self, product_id: &str, quantity: i32) -> Result<bool, StockError> {
        (**self).check_stock(product_id, quantity).await
    }

    async fn reserve_stock(
        &self,
        product_id: &str,
        quantity: i32,
        order_id: Uuid,
    ) -> Result<(), StockError> {
        (**self).reserve_stock(product_id, quantity, order_id).await
    }

    async fn release_stock(
        &self,
        product_id: &str,
        quantity: i32,
        order_id: Uuid,
    ) -> Result<(), StockError> {
        (**self).release_stock(product_id, quantity, order_id).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckStockRequest {
    pub product_id: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveStockRequest {
    pub product_id: String,
    pub quantity: i32,
    pub order_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseStockRequest {
    pub product_id: String,
    pub quantity: i32,
    pub order_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum StockRequest {
    CheckStock(CheckStockRequest),
    ReserveStock(ReserveStockRequest),
    ReleaseStock(ReleaseStockRequest),
}

impl StockRequest {
    pub fn name(&self) -> &'static str {
        match self {
            StockRequest::CheckStock(_) => "CheckStock",
            StockRequest::ReserveStock(_) => "ReserveStock",
            StockRequest::ReleaseStock(_) => "ReleaseStock",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckStockResponse {
    pub available: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StockError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveStockResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StockError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseStockResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StockError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum StockResponse {
    CheckStock(CheckStockResponse),
    ReserveStock(ReserveStockResponse),
    ReleaseStock(ReleaseStockResponse),
}

impl StockResponse {
    pub fn check(result: Result<bool, StockError>) -> Self {
        match result {
            Ok(available) => StockResponse::CheckStock(CheckStockResponse {
                available,
                message: String::new(),
                error: None,
            }),
            Err(e) => StockResponse::CheckStock(CheckStockResponse {
                available: false,
                message: e.to_string(),
                error: Some(e),
            }),
        }
    }

    pub fn reserve(result: Result<(), StockError>) -> Self {
        let (success, message, error) = outcome_fields(result);
        StockResponse::ReserveStock(ReserveStockResponse {
            success,
            message,
            error,
        })
    }

    pub fn release(result: Result<(), StockError>) -> Self {
        let (success, message, error) = outcome_fields(result);
        StockResponse::ReleaseStock(ReleaseStockResponse {
            success,
            message,
            error,
        })
    }
}

fn outcome_fields(result: Result<(), StockError>) -> (bool, String, Option<StockError>) {
    match result {
        Ok(()) => (true, String::new(), None),
        Err(e) => (false, e.to_string(), Some(e)),
    }
}

/// A stock request published to the inventory command topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockCommand {
    pub id: Uuid,
    pub reply_topic: String,
    pub request: StockRequest,
    pub created_at: DateTime<Utc>,
}

/// The inventory service's answer to a [`StockCommand`], correlated by `command_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockReply {
    pub id: Uuid,
    pub command_id: Uuid,
    pub response: StockResponse,
    pub created_at: DateTime<Utc>,
}

impl StockCommand {
    pub fn new(request: StockRequest, reply_topic: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            reply_topic: reply_topic.into(),
            request,
            created_at: Utc::now(),
        }
    }
}

impl StockReply {
    pub fn new(command_id: Uuid, response: StockResponse) -> Self {
        Self {
            id: Uuid::new_v4(),
            command_id,
            response,
            created_at: Utc::now(),
        }
    }
}
