use anyhow::Result;
use futures::StreamExt;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::Message;
use shared::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Serves stock commands from the inventory command topic.
///
/// Each command runs on its own task; the reply goes to the topic named in the
/// command, keyed by command id.
pub struct CommandHandler<S> {
    stock: Arc<S>,
    producer: FutureProducer,
}

impl<S: StockReservations + 'static> CommandHandler<S> {
    pub fn new(stock: Arc<S>, producer: FutureProducer) -> Self {
        Self { stock, producer }
    }

    pub async fn run(self: Arc<Self>, consumer: StreamConsumer) {
        let mut message_stream = consumer.stream();

        while let Some(message) = message_stream.next().await {
            match message {
                Ok(m) => {
                    match m.payload_view::<str>() {
                        Some(Ok(json_str)) => match serde_json::from_str::<StockCommand>(json_str) {
                            Ok(command) => {
                                let handler = Arc::clone(&self);
                                tokio::spawn(async move {
                                    if let Err(e) = handler.handle_command(command).await {
                                        error!("Error handling stock command: {}", e);
                                    }
                                });
                            }
                            Err(e) => error!("Discarding undecodable stock command: {}", e),
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

    async fn handle_command(&self, command: StockCommand) -> Result<()> {
        info!(
            command_id = %command.id,
            request = command.request.name(),
            "handling stock command"
        );

        let response = dispatch(self.stock.as_ref(), command.request).await;
        let reply = StockReply::new(command.id, response);
        self.send_reply(&command.reply_topic, reply).await
    }

    async fn send_reply(&self, topic: &str, reply: StockReply) -> Result<()> {
        let json = serde_json::to_string(&reply)?;
        let key = reply.command_id.to_string();
        let record = FutureRecord::to(topic).payload(&json).key(&key);

        self.producer
            .send(record, Duration::from_secs(5))
            .await
            .map_err(|(e, _)| anyhow::anyhow!("Failed to send reply: {}", e))?;

        Ok(())
    }
}

/// Runs one request against the engine and shapes the outcome as a reply body.
///
/// Business failures are answered, never raised.
pub async fn dispatch<S: StockReservations + ?Sized>(stock: &S, request: StockRequest) -> StockResponse {
    match request {
        StockRequest::CheckStock(req) => {
            StockResponse::check(stock.check_stock(&req.product_id, req.quantity).await)
        }
        StockRequest::ReserveStock(req) => StockResponse::reserve(
            stock
                .reserve_stock(&req.product_id, req.quantity, req.order_id)
                .await,
        ),
        StockRequest::ReleaseStock(req) => StockResponse::release(
            stock
                .release_stock(&req.product_id, req.quantity, req.order_id)
                .await,
        ),
    }
}
