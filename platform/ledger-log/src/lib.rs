//! # ledger-log
//!
//! The Kafka-backed transaction log shared by the Relay (producer side) and
//! the Applier (consumer side).
//!
//! ## Why This Lives in Tier 1
//!
//! The log is a **shared runtime capability**: the Relay publishes envelopes
//! to it, the Applier consumes them, and both need the same wire format and
//! the same retry policy. Placing it in `platform/` keeps that contract in
//! one place instead of duplicated across the two services.
//!
//! ## Modules
//!
//! - [`envelope`]: the wire format carried on the `transactions` /
//!   `transactions.dlq` topics, plus deterministic envelope id derivation.
//! - [`kafka`]: thin wrappers over `rdkafka`'s producer and consumer.
//! - [`consumer_retry`]: linear-backoff retry used by the Applier before a
//!   message is routed to the DLQ.

pub mod consumer_retry;
pub mod envelope;
pub mod kafka;

pub use consumer_retry::{retry_with_backoff, Retriable, RetryConfig};
pub use envelope::{
    deterministic_envelope_id, validate_envelope_fields, Envelope, TransactionCreatedPayload,
    EVENT_TYPE_TRANSACTION_CREATED, HEADER_AGGREGATE_ID, HEADER_DLQ_REASON, HEADER_EVENT_TYPE,
    HEADER_ORIGINAL_OFFSET, HEADER_ORIGINAL_PARTITION,
};
pub use kafka::{ConsumedMessage, KafkaConsumer, KafkaError, KafkaHeader, KafkaProducer};
