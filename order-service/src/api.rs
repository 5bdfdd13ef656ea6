use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use shared::{StockError, StockReservations};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::OrderError;
use crate::models::{CreateOrderRequest, Order};
use crate::saga::OrderSaga;
use crate::store::OrderStore;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Maps saga failures onto HTTP statuses.
#[derive(Debug)]
pub struct ApiError(OrderError);

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            OrderError::Validation(_) => StatusCode::BAD_REQUEST,
            OrderError::NotFound(_) => StatusCode::NOT_FOUND,
            OrderError::Reservation(e)
                if e.is_peer_failure() || matches!(e, StockError::Storage { .. }) =>
            {
                StatusCode::SERVICE_UNAVAILABLE
            }
            OrderError::Reservation(_) | OrderError::NoLongerPending(_) => StatusCode::CONFLICT,
            OrderError::Store(e) => {
                tracing::error!(error = %e, "order store failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorResponse {
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn create_router<S, R>(saga: Arc<OrderSaga<S, R>>) -> Router
where
    S: OrderStore + 'static,
    R: StockReservations + 'static,
{
    Router::new()
        .route("/orders", get(list_orders::<S, R>).post(create_order::<S, R>))
        .route("/orders/:id", get(get_order::<S, R>))
        .route("/health", get(health_check))
        .with_state(saga)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

pub async fn create_order<S: OrderStore, R: StockReservations>(
    State(saga): State<Arc<OrderSaga<S, R>>>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    match saga.create_order(request).await {
        Ok(order) => {
            tracing::info!(order_id = %order.id, status = %order.status, "order created");
            Ok((StatusCode::CREATED, Json(order)))
        }
        Err(e) => {
            tracing::warn!(error = %e, "order creation failed");
            Err(e.into())
        }
    }
}

pub async fn get_order<S: OrderStore, R: StockReservations>(
    State(saga): State<Arc<OrderSaga<S, R>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(saga.get_order(id).await?))
}

pub async fn list_orders<S: OrderStore, R: StockReservations>(
    State(saga): State<Arc<OrderSaga<S, R>>>,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(saga.list_orders().await?))
}

pub async fn health_check() -> &'static str {
    "OK"
}
