//! The order saga running against the reservation engine in-process.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use inventory_service::{MemoryLedger, ReservationEngine, RetryPolicy, StockLedger};
use order_service::models::{CreateOrderRequest, Order, OrderItemRequest, OrderStatus};
use order_service::recovery::ReconciliationWorker;
use order_service::{MemoryOrderStore, OrderError, OrderSaga};
use shared::{StockError, StockReservations};
use uuid::Uuid;

type Engine = ReservationEngine<MemoryLedger>;

async fn setup(stock: &[(&str, i32)]) -> (OrderSaga<MemoryOrderStore, Arc<Engine>>, MemoryLedger) {
    let ledger = MemoryLedger::new();
    for (product_id, quantity) in stock {
        ledger.stock(product_id, *quantity).await;
    }
    let engine = Arc::new(ReservationEngine::new(ledger.clone(), RetryPolicy::no_retry()));
    let saga = OrderSaga::new(MemoryOrderStore::new(), engine, Duration::from_secs(1));
    (saga, ledger)
}

fn item(product_id: &str, quantity: i32, price: &str) -> OrderItemRequest {
    OrderItemRequest {
        product_id: product_id.to_string(),
        quantity,
        price: price.parse().unwrap(),
    }
}

async fn reserved(ledger: &MemoryLedger, product_id: &str) -> i32 {
    ledger.levels(product_id).await.unwrap().unwrap().reserved
}

#[tokio::test]
async fn partial_failure_rejects_and_restores_reserved_stock() {
    let (saga, ledger) = setup(&[("prod-A", 10), ("prod-B", 0)]).await;

    let err = saga
        .create_order(CreateOrderRequest {
            user_id: "user-1".to_string(),
            items: vec![item("prod-A", 2, "10.00"), item("prod-B", 2, "5.00")],
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrderError::Reservation(StockError::InsufficientStock { ref product_id, .. })
            if product_id == "prod-B"
    ));
    assert_eq!(reserved(&ledger, "prod-A").await, 0);
    assert_eq!(reserved(&ledger, "prod-B").await, 0);
    assert_eq!(ledger.reservation_count().await, 0);

    let orders = saga.list_orders().await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatus::Rejected);
}

#[tokio::test]
async fn repeated_product_lines_never_reach_the_ledger() {
    let (saga, ledger) = setup(&[("prod-A", 10)]).await;

    for items in [
        vec![item("prod-A", 2, "1.00"), item("prod-A", 2, "1.00")],
        vec![item("prod-A", 3, "1.00"), item("prod-A", 2, "1.00")],
    ] {
        let err = saga
            .create_order(CreateOrderRequest {
                user_id: "user-1".to_string(),
                items,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)), "{err:?}");
    }

    assert_eq!(reserved(&ledger, "prod-A").await, 0);
    assert!(saga.list_orders().await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_product_rejects_the_order() {
    let (saga, ledger) = setup(&[("prod-A", 10)]).await;

    let err = saga
        .create_order(CreateOrderRequest {
            user_id: "user-1".to_string(),
            items: vec![item("prod-A", 1, "1.00"), item("prod-404", 1, "1.00")],
        })
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::Reservation(StockError::NotFound { .. })));
    assert_eq!(reserved(&ledger, "prod-A").await, 0);
}

#[tokio::test]
async fn confirmed_order_round_trips_through_get() {
    let (saga, ledger) = setup(&[("prod-001", 10), ("prod-002", 5)]).await;

    let created = saga
        .create_order(CreateOrderRequest {
            user_id: "user-42".to_string(),
            items: vec![item("prod-001", 3, "19.99"), item("prod-002", 5, "4.50")],
        })
        .await
        .unwrap();

    assert_eq!(created.status, OrderStatus::Confirmed);
    assert_eq!(reserved(&ledger, "prod-001").await, 3);
    assert_eq!(reserved(&ledger, "prod-002").await, 5);
    assert_eq!(ledger.reservation_of(created.id, "prod-002").await, 5);

    let fetched = saga.get_order(created.id).await.unwrap();
    assert_eq!(fetched, created);
    assert_eq!(fetched.user_id, "user-42");
    let lines: Vec<(&str, i32, BigDecimal)> = fetched
        .items
        .iter()
        .map(|i| (i.product_id.as_str(), i.quantity, i.price.clone()))
        .collect();
    assert_eq!(
        lines,
        vec![
            ("prod-001", 3, "19.99".parse().unwrap()),
            ("prod-002", 5, "4.50".parse().unwrap()),
        ]
    );
}

#[tokio::test]
async fn orders_are_listed_newest_first() {
    let (saga, _ledger) = setup(&[("prod-001", 10)]).await;
    let mut ids = Vec::new();
    for _ in 0..3 {
        let order = saga
            .create_order(CreateOrderRequest {
                user_id: "user-1".to_string(),
                items: vec![item("prod-001", 1, "2.00")],
            })
            .await
            .unwrap();
        ids.push(order.id);
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let listed: Vec<Uuid> = saga.list_orders().await.unwrap().iter().map(|o| o.id).collect();
    ids.reverse();
    assert_eq!(listed, ids);
}

#[tokio::test]
async fn second_order_for_the_last_units_is_rejected() {
    let (saga, ledger) = setup(&[("prod-001", 2)]).await;
    let request = CreateOrderRequest {
        user_id: "user-1".to_string(),
        items: vec![item("prod-001", 2, "3.00")],
    };

    saga.create_order(request.clone()).await.unwrap();
    let err = saga.create_order(request).await.unwrap_err();

    assert!(matches!(
        err,
        OrderError::Reservation(StockError::InsufficientStock { available: 0, .. })
    ));
    assert_eq!(reserved(&ledger, "prod-001").await, 2);
}

/// Accepts reservations but never answers.
struct Unresponsive;

#[async_trait]
impl StockReservations for Unresponsive {
    async fn check_stock(&self, _product_id: &str, _quantity: i32) -> Result<bool, StockError> {
        Ok(true)
    }

    async fn reserve_stock(&self, _product_id: &str, _quantity: i32, _order_id: Uuid) -> Result<(), StockError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    }

    async fn release_stock(&self, _product_id: &str, _quantity: i32, _order_id: Uuid) -> Result<(), StockError> {
        Ok(())
    }
}

#[tokio::test]
async fn timed_out_reservation_is_a_peer_failure() {
    let saga = OrderSaga::new(MemoryOrderStore::new(), Unresponsive, Duration::from_millis(20));

    let err = saga
        .create_order(CreateOrderRequest {
            user_id: "user-1".to_string(),
            items: vec![item("prod-001", 1, "1.00")],
        })
        .await
        .unwrap_err();

    match err {
        OrderError::Reservation(e) => assert!(e.is_peer_failure()),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(saga.list_orders().await.unwrap()[0].status, OrderStatus::Rejected);
}

#[tokio::test]
async fn reconciliation_releases_stock_held_by_an_abandoned_order() {
    let (saga, ledger) = setup(&[("prod-001", 10)]).await;

    // A saga that reserved stock and then died before finalizing.
    let mut abandoned = Order::pending(&CreateOrderRequest {
        user_id: "user-1".to_string(),
        items: vec![item("prod-001", 4, "1.00")],
    });
    abandoned.created_at = Utc::now() - chrono::Duration::minutes(15);
    saga.store().insert(abandoned.clone());
    let engine = ReservationEngine::new(ledger.clone(), RetryPolicy::no_retry());
    engine.reserve("prod-001", 4, abandoned.id).await.unwrap();
    assert_eq!(reserved(&ledger, "prod-001").await, 4);

    let saga = Arc::new(saga);
    let worker = ReconciliationWorker::new(
        Arc::clone(&saga),
        Duration::from_secs(60),
        chrono::Duration::minutes(5),
    );

    assert_eq!(worker.sweep().await.unwrap(), 1);
    assert_eq!(saga.store().status_of(abandoned.id), Some(OrderStatus::Rejected));
    assert_eq!(reserved(&ledger, "prod-001").await, 0);
    assert_eq!(worker.sweep().await.unwrap(), 0);
}
