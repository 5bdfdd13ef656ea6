use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::Message;
use shared::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error};
use uuid::Uuid;

type Waiters = Mutex<HashMap<Uuid, oneshot::Sender<StockResponse>>>;

/// Talks to the inventory service over its command topic.
///
/// Replies arrive on `reply_topic` and are matched to callers by command id;
/// [`KafkaStockClient::run_reply_listener`] must be running for calls to complete.
#[derive(Clone)]
pub struct KafkaStockClient {
    producer: FutureProducer,
    command_topic: String,
    reply_topic: String,
    waiters: Arc<Waiters>,
}

/// Drops the waiter for a command when its call finishes or is cancelled.
struct WaiterGuard<'a> {
    waiters: &'a Waiters,
    command_id: Uuid,
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        self.waiters.lock().remove(&self.command_id);
    }
}

impl KafkaStockClient {
    pub fn new(
        producer: FutureProducer,
        command_topic: impl Into<String>,
        reply_topic: impl Into<String>,
    ) -> Self {
        Self {
            producer,
            command_topic: command_topic.into(),
            reply_topic: reply_topic.into(),
            waiters: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn run_reply_listener(&self, consumer: StreamConsumer) {
        let mut message_stream = consumer.stream();

        while let Some(message) = message_stream.next().await {
            match message {
                Ok(m) => {
                    match m.payload_view::<str>() {
                        Some(Ok(json_str)) => match serde_json::from_str::<StockReply>(json_str) {
                            Ok(reply) => self.deliver(reply),
                            Err(e) => error!("Discarding undecodable stock reply: {}", e),
                        },
                        Some(Err(e)) => error!("Error parsing payload: {}", e),
                        None => {}
                    }
                    if let Err(e) = consumer.commit_message(&m, CommitMode::Async) {
                        error!("Error committing message: {}", e);
                    }
                }
                Err(e) => error!("Error receiving message: {}", e),
            }
        }
    }

    fn deliver(&self, reply: StockReply) {
        match self.waiters.lock().remove(&reply.command_id) {
            Some(waiter) => {
                // The caller may have given up already.
                let _ = waiter.send(reply.response);
            }
            None => debug!(command_id = %reply.command_id, "no caller waiting for stock reply"),
        }
    }

    async fn call(&self, request: StockRequest) -> Result<StockResponse, StockError> {
        let command = StockCommand::new(request, self.reply_topic.clone());
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().insert(command.id, tx);
        let _guard = WaiterGuard {
            waiters: &self.waiters,
            command_id: command.id,
        };

        let json = serde_json::to_string(&command)
            .map_err(|e| StockError::peer_unavailable(format!("failed to encode command: {e}")))?;
        let key = command.id.to_string();
        let record = FutureRecord::to(&self.command_topic).payload(&json).key(&key);

        debug!(command_id = %command.id, request = command.request.name(), "sending stock command");
        self.producer
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(e, _)| StockError::peer_unavailable(format!("failed to send command: {e}")))?;

        rx.await
            .map_err(|_| StockError::peer_unavailable("reply listener stopped"))
    }
}

fn unexpected(response: &StockResponse) -> StockError {
    StockError::peer_unavailable(format!("unexpected reply: {response:?}"))
}

fn outcome(success: bool, message: String, error: Option<StockError>) -> Result<(), StockError> {
    if success {
        return Ok(());
    }
    Err(error.unwrap_or(StockError::Storage { message }))
}

#[async_trait]
impl StockReservations for KafkaStockClient {
    async fn check_stock(&self, product_id: &str, quantity: i32) -> Result<bool, StockError> {
        let response = self
            .call(StockRequest::CheckStock(CheckStockRequest {
                product_id: product_id.to_string(),
                quantity,
            }))
            .await?;

        match response {
            StockResponse::CheckStock(body) => match body.error {
                Some(e) => Err(e),
                None => Ok(body.available),
            },
            other => Err(unexpected(&other)),
        }
    }

    async fn reserve_stock(
        &self,
        product_id: &str,
        quantity: i32,
        order_id: Uuid,
    ) -> Result<(), StockError> {
        let response = self
            .call(StockRequest::ReserveStock(ReserveStockRequest {
                product_id: product_id.to_string(),
                quantity,
                order_id,
            }))
            .await?;

        match response {
            StockResponse::ReserveStock(body) => outcome(body.success, body.message, body.error),
            other => Err(unexpected(&other)),
        }
    }

    async fn release_stock(
        &self,
        product_id: &str,
        quantity: i32,
        order_id: Uuid,
    ) -> Result<(), StockError> {
        let response = self
            .call(StockRequest::ReleaseStock(ReleaseStockRequest {
                product_id: product_id.to_string(),
                quantity,
                order_id,
            }))
            .await?;

        match response {
            StockResponse::ReleaseStock(body) => outcome(body.success, body.message, body.error),
            other => Err(unexpected(&other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_outcome_prefers_the_structured_error() {
        let err = outcome(
            false,
            "product not found: prod-009".to_string(),
            Some(StockError::NotFound {
                product_id: "prod-009".to_string(),
            }),
        )
        .unwrap_err();
        assert!(matches!(err, StockError::NotFound { .. }));
    }

    #[test]
    fn failed_outcome_without_kind_keeps_the_message() {
        let err = outcome(false, "disk full".to_string(), None).unwrap_err();
        assert_eq!(
            err,
            StockError::Storage {
                message: "disk full".to_string()
            }
        );
        assert!(outcome(true, String::new(), None).is_ok());
    }

    #[test]
    fn mismatched_reply_is_a_peer_failure() {
        assert!(unexpected(&StockResponse::check(Ok(true))).is_peer_failure());
    }
}
