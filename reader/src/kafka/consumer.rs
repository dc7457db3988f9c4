use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::ClientConfig;
use thiserror::Error;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> anyhow::Result<()>;
}

/// Consumer-group loop dispatching messages to per-topic handlers.
///
/// Offsets are committed only after a handler succeeds, so a failed message
/// is redelivered. The per-message deadline must stay well below the group
/// session timeout.
pub struct ConsumerLoop {
    consumer: StreamConsumer,
    handlers: HashMap<String, Arc<dyn MessageHandler>>,
    message_timeout: Duration,
}

impl ConsumerLoop {
    pub fn new(
        brokers: &str,
        group_id: &str,
        handlers: HashMap<String, Arc<dyn MessageHandler>>,
    ) -> Result<Self, ConsumerError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "false")
            .create()?;

        let topics: Vec<&str> = handlers.keys().map(String::as_str).collect();
        consumer.subscribe(&topics)?;

        info!(?topics, group_id, "subscribed");

        Ok(Self {
            consumer,
            handlers,
            message_timeout: Duration::from_secs(3),
        })
    }

    /// Consume until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                result = self.consumer.recv() => match result {
                    Ok(message) => self.process(&message).await,
                    Err(err) => warn!(error = %err, "Kafka consumer error"),
                },
                _ = cancel.cancelled() => {
                    info!("Consumer stopped");
                    return;
                }
            }
        }
    }

    async fn process(&self, message: &BorrowedMessage<'_>) {
        let topic = message.topic();

        let Some(handler) = self.handlers.get(topic) else {
            warn!(topic, "No registered handler");
            self.commit(message);
            return;
        };

        let payload = message.payload().unwrap_or_default();

        match timeout(self.message_timeout, handler.handle(payload)).await {
            Ok(Ok(())) => {
                self.commit(message);
                debug!(
                    topic,
                    partition = message.partition(),
                    offset = message.offset(),
                    "Message handled"
                );
            }
            Ok(Err(err)) => {
                // No commit: the message is redelivered.
                error!(
                    topic,
                    partition = message.partition(),
                    offset = message.offset(),
                    error = %err,
                    "Failed to handle message"
                );
            }
            Err(_) => {
                error!(
                    topic,
                    partition = message.partition(),
                    offset = message.offset(),
                    "Message handling timed out"
                );
            }
        }
    }

    fn commit(&self, message: &BorrowedMessage<'_>) {
        if let Err(err) = self.consumer.commit_message(message, CommitMode::Async) {
            error!(error = %err, "Failed to commit offset");
        }
    }
}
