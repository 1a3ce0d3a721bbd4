//! Producer and consumer wrappers around `rdkafka`.
//!
//! `KafkaProducer` publishes envelopes keyed by `aggregate_id` so that all
//! events for one account land on the same partition and are seen in order
//! by a single consumer. `KafkaConsumer` wraps a `StreamConsumer` with
//! manual offset commit: the Applier only commits an offset after the
//! corresponding message has been durably applied (or DLQed), never before.

use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{Headers, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::TopicPartitionList;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Error)]
pub enum KafkaError {
    #[error("failed to create producer: {0}")]
    ProducerInit(String),
    #[error("failed to create consumer: {0}")]
    ConsumerInit(String),
    #[error("failed to publish message: {0}")]
    Publish(String),
    #[error("failed to poll consumer: {0}")]
    Poll(String),
    #[error("failed to commit offset: {0}")]
    Commit(String),
    #[error("message payload missing")]
    EmptyPayload,
}

/// A single key/value header attached to a published message.
pub struct KafkaHeader {
    pub key: &'static str,
    pub value: String,
}

impl KafkaHeader {
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self { key, value: value.into() }
    }
}

/// Thin wrapper over `rdkafka::producer::FutureProducer`.
///
/// `enable.idempotence` is on so retried sends under the hood (broker-level,
/// not application-level) never duplicate a partition offset; it says
/// nothing about the Applier's own dedup, which is handled separately via
/// `processed_events`.
pub struct KafkaProducer {
    producer: FutureProducer,
}

impl KafkaProducer {
    pub fn new(brokers: &str) -> Result<Self, KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "10000")
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("compression.type", "snappy")
            .create()
            .map_err(|e| KafkaError::ProducerInit(e.to_string()))?;

        Ok(Self { producer })
    }

    /// Publish `payload` to `topic`, partitioned by `key`.
    pub async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
        headers: Vec<KafkaHeader>,
    ) -> Result<(i32, i64), KafkaError> {
        let mut owned_headers = OwnedHeaders::new();
        for h in &headers {
            owned_headers = owned_headers.insert(rdkafka::message::Header {
                key: h.key,
                value: Some(h.value.as_str()),
            });
        }

        let record = FutureRecord::to(topic)
            .key(key)
            .payload(payload)
            .headers(owned_headers);

        match self.producer.send(record, Duration::from_secs(10)).await {
            Ok((partition, offset)) => {
                debug!(topic, key, partition, offset, "published message");
                Ok((partition, offset))
            }
            Err((e, _)) => {
                error!(topic, key, error = %e, "failed to publish message");
                Err(KafkaError::Publish(e.to_string()))
            }
        }
    }
}

/// A message pulled off a `StreamConsumer`, detached from its borrow on the
/// consumer so it can be handed to application code and held across `.await`
/// points before being committed.
pub struct ConsumedMessage {
    pub payload: Vec<u8>,
    pub key: Option<Vec<u8>>,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub headers: Vec<(String, String)>,
}

/// Thin wrapper over `rdkafka::consumer::StreamConsumer` with manual commit.
///
/// `enable.auto.commit` is off: the caller commits explicitly, after a
/// message has either been applied or routed to the DLQ, never before —
/// otherwise a crash between poll and apply would silently drop the message.
pub struct KafkaConsumer {
    consumer: StreamConsumer,
}

impl KafkaConsumer {
    pub fn new(brokers: &str, group_id: &str, topics: &[&str]) -> Result<Self, KafkaError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "10000")
            .create()
            .map_err(|e| KafkaError::ConsumerInit(e.to_string()))?;

        consumer
            .subscribe(topics)
            .map_err(|e| KafkaError::ConsumerInit(e.to_string()))?;

        Ok(Self { consumer })
    }

    /// Pull the next message, blocking until one arrives.
    pub async fn recv(&self) -> Result<ConsumedMessage, KafkaError> {
        let borrowed = self
            .consumer
            .recv()
            .await
            .map_err(|e| KafkaError::Poll(e.to_string()))?;

        let payload = borrowed.payload().ok_or(KafkaError::EmptyPayload)?.to_vec();
        let key = borrowed.key().map(|k| k.to_vec());
        let topic = borrowed.topic().to_string();
        let partition = borrowed.partition();
        let offset = borrowed.offset();

        let mut headers = Vec::new();
        if let Some(h) = borrowed.headers() {
            for i in 0..h.count() {
                let header = h.get(i);
                if let Some(value) = header.value {
                    headers.push((
                        header.key.to_string(),
                        String::from_utf8_lossy(value).to_string(),
                    ));
                }
            }
        }

        Ok(ConsumedMessage {
            payload,
            key,
            topic,
            partition,
            offset,
            headers,
        })
    }

    /// Commit the offset for a message that has been durably handled.
    /// Commits `offset + 1` (the next offset to read), per Kafka convention.
    pub fn commit(&self, msg: &ConsumedMessage) -> Result<(), KafkaError> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &msg.topic,
            msg.partition,
            rdkafka::Offset::Offset(msg.offset + 1),
        )
        .map_err(|e| KafkaError::Commit(e.to_string()))?;

        self.consumer
            .commit(&tpl, CommitMode::Sync)
            .map_err(|e| {
                warn!(topic = %msg.topic, partition = msg.partition, offset = msg.offset, error = %e, "commit failed");
                KafkaError::Commit(e.to_string())
            })
    }
}
