//! The envelope-processing loop (§4.3).
//!
//! ```text
//! FETCHED -> PARSED -> [DUPLICATE -> DONE]
//!                    -> [CLAIMED -> APPLIED -> DONE]
//!                    -> [BUSINESS-FAIL -> MARKED-FAILED -> DONE]
//!                    -> [TRANSIENT-FAIL -> (retry<N) | DLQ] -> DONE
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ledger_log::{
    retry_with_backoff, ConsumedMessage, Envelope, KafkaConsumer, KafkaHeader, KafkaProducer,
    RetryConfig, TransactionCreatedPayload, EVENT_TYPE_TRANSACTION_CREATED, HEADER_DLQ_REASON,
    HEADER_ORIGINAL_OFFSET, HEADER_ORIGINAL_PARTITION,
};
use sqlx::PgPool;

use crate::apply::apply_once;

/// Runs until `shutting_down` is observed true. Never aborts a message
/// mid-apply: the flag is only checked between messages, never while one is
/// being processed, so an offset is never committed for cancelled work.
pub async fn run(
    pool: &PgPool,
    consumer: &KafkaConsumer,
    dlq_producer: &KafkaProducer,
    dlq_topic: &str,
    shutting_down: Arc<AtomicBool>,
) {
    let retry_config = RetryConfig::default();

    while !shutting_down.load(Ordering::SeqCst) {
        // Bounded wait: re-checks the shutdown flag even when the topic is
        // idle, instead of blocking on `recv()` forever.
        let msg = match tokio::time::timeout(std::time::Duration::from_secs(5), consumer.recv()).await
        {
            Ok(Ok(msg)) => msg,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "failed to poll consumer, retrying");
                continue;
            }
            Err(_) => continue,
        };

        process_message(pool, &msg, consumer, dlq_producer, dlq_topic, &retry_config).await;
    }

    tracing::info!("applier stopped");
}

async fn process_message(
    pool: &PgPool,
    msg: &ConsumedMessage,
    consumer: &KafkaConsumer,
    dlq_producer: &KafkaProducer,
    dlq_topic: &str,
    retry_config: &RetryConfig,
) {
    let envelope = match parse_envelope(&msg.payload) {
        Some(envelope) => envelope,
        None => {
            tracing::warn!(
                topic = %msg.topic,
                partition = msg.partition,
                offset = msg.offset,
                "poison message: failed to parse envelope, committing offset"
            );
            commit(consumer, msg);
            return;
        }
    };

    if envelope.event_type != EVENT_TYPE_TRANSACTION_CREATED {
        tracing::warn!(
            event_id = %envelope.event_id,
            event_type = %envelope.event_type,
            "unrecognized event type, committing offset"
        );
        commit(consumer, msg);
        return;
    }

    let payload: TransactionCreatedPayload = match serde_json::from_value(envelope.payload.clone())
    {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(
                event_id = %envelope.event_id,
                error = %e,
                "poison message: failed to parse transaction.created payload, committing offset"
            );
            commit(consumer, msg);
            return;
        }
    };

    let span = tracing::info_span!(
        "apply_envelope",
        event_id = %envelope.event_id,
        trace_id = %envelope.trace_id,
        account_id = %payload.account_id,
        transaction_id = %payload.transaction_id,
    );
    let _enter = span.enter();

    let result = retry_with_backoff(
        || apply_once(pool, &envelope, &payload),
        retry_config,
        "applier",
    )
    .await;

    match result {
        Ok(outcome) => {
            log_outcome(&outcome);
            commit(consumer, msg);
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                attempts = retry_config.max_attempts,
                "retries exhausted, routing to DLQ"
            );
            route_to_dlq(consumer, msg, dlq_producer, dlq_topic, &e.to_string()).await;
        }
    }
}

fn log_outcome(outcome: &crate::apply::ApplyOutcome) {
    use crate::apply::ApplyOutcome;
    match outcome {
        ApplyOutcome::Duplicate => tracing::info!(metric = "duplicate", "envelope already applied"),
        ApplyOutcome::Processed => tracing::info!(metric = "success", "balance mutation applied"),
        ApplyOutcome::Failed(reason) => {
            tracing::info!(metric = "failed", reason = %reason, "business failure, transaction marked FAILED")
        }
    }
}

/// Publish the original raw message to the DLQ, then — only on success —
/// commit the consumer offset. A DLQ write failure leaves the offset
/// uncommitted: the message is redelivered rather than silently dropped.
async fn route_to_dlq(
    consumer: &KafkaConsumer,
    msg: &ConsumedMessage,
    dlq_producer: &KafkaProducer,
    dlq_topic: &str,
    dlq_reason: &str,
) {
    let key = msg
        .key
        .as_ref()
        .map(|k| String::from_utf8_lossy(k).to_string())
        .unwrap_or_default();

    let headers = vec![
        KafkaHeader::new(HEADER_DLQ_REASON, dlq_reason.to_string()),
        KafkaHeader::new(HEADER_ORIGINAL_PARTITION, msg.partition.to_string()),
        KafkaHeader::new(HEADER_ORIGINAL_OFFSET, msg.offset.to_string()),
    ];

    match dlq_producer
        .publish(dlq_topic, &key, &msg.payload, headers)
        .await
    {
        Ok(_) => {
            tracing::error!(
                topic = %msg.topic,
                partition = msg.partition,
                offset = msg.offset,
                "message routed to DLQ"
            );
            commit(consumer, msg);
        }
        Err(e) => {
            tracing::error!(
                topic = %msg.topic,
                partition = msg.partition,
                offset = msg.offset,
                error = %e,
                "DLQ write failed, offset NOT committed, message will be redelivered"
            );
        }
    }
}

fn commit(consumer: &KafkaConsumer, msg: &ConsumedMessage) {
    if let Err(e) = consumer.commit(msg) {
        tracing::error!(
            topic = %msg.topic,
            partition = msg.partition,
            offset = msg.offset,
            error = %e,
            "failed to commit offset"
        );
    }
}

fn parse_envelope(raw: &[u8]) -> Option<Envelope> {
    let value: serde_json::Value = serde_json::from_slice(raw).ok()?;
    ledger_log::validate_envelope_fields(&value).ok()?;
    serde_json::from_value(value).ok()
}
