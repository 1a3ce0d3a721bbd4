//! The outbox-draining tick.
//!
//! One call to [`run_tick`] claims a batch of `PENDING` outbox rows (skipping
//! rows already locked by another replica), publishes each to the log keyed
//! by aggregate id, and marks it `PUBLISHED` — all inside the transaction
//! that holds the row locks, so a crash mid-batch leaves every unpublished
//! row exactly where the next tick (on any replica) will find it again.

use ledger_db::models::OutboxEvent;
use ledger_db::outbox_repo;
use ledger_log::{
    deterministic_envelope_id, Envelope, KafkaHeader, KafkaProducer, EVENT_TYPE_TRANSACTION_CREATED,
    HEADER_AGGREGATE_ID, HEADER_EVENT_TYPE,
};
use sqlx::PgPool;
use uuid::Uuid;

/// Outcome of one tick, logged by the caller for `outbox_lag` observability.
#[derive(Debug, Default)]
pub struct TickReport {
    pub claimed: usize,
    pub published: usize,
    pub failed: usize,
}

pub async fn run_tick(
    pool: &PgPool,
    producer: &KafkaProducer,
    topic: &str,
    batch_size: i64,
) -> Result<TickReport, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let rows = outbox_repo::claim_batch_tx(&mut tx, batch_size)
        .await
        .map_err(map_repo_err)?;

    let mut report = TickReport {
        claimed: rows.len(),
        ..Default::default()
    };

    for row in rows {
        let envelope = build_envelope(&row);
        let payload_bytes = match serde_json::to_vec(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                outbox_repo::mark_publish_failed_tx(&mut tx, row.id, &e.to_string())
                    .await
                    .map_err(map_repo_err)?;
                report.failed += 1;
                continue;
            }
        };

        let headers = vec![
            KafkaHeader::new(HEADER_EVENT_TYPE, envelope.event_type.clone()),
            KafkaHeader::new(HEADER_AGGREGATE_ID, envelope.aggregate_id.to_string()),
        ];

        match producer
            .publish(topic, &row.aggregate_id.to_string(), &payload_bytes, headers)
            .await
        {
            Ok(_) => {
                outbox_repo::mark_published_tx(&mut tx, row.id)
                    .await
                    .map_err(map_repo_err)?;
                report.published += 1;
            }
            Err(e) => {
                tracing::warn!(
                    outbox_id = %row.id,
                    aggregate_id = %row.aggregate_id,
                    error = %e,
                    "failed to publish outbox row, will retry next tick"
                );
                outbox_repo::mark_publish_failed_tx(&mut tx, row.id, &e.to_string())
                    .await
                    .map_err(map_repo_err)?;
                report.failed += 1;
            }
        }
    }

    tx.commit().await?;
    Ok(report)
}

/// Build the envelope for an outbox row.
///
/// Envelope id is derived deterministically from the row id so a republish
/// of the same row (e.g. after this tick's transaction rolled back) produces
/// the same dedup key on the Applier side rather than a fresh one.
fn build_envelope(row: &OutboxEvent) -> Envelope {
    let idempotency_key = if row.event_type == EVENT_TYPE_TRANSACTION_CREATED {
        row.payload
            .get("idempotency_key")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    } else {
        String::new()
    };

    Envelope::new(
        deterministic_envelope_id(row.id),
        row.event_type.clone(),
        row.created_at,
        trace_id_for(row.id),
        idempotency_key,
        row.aggregate_id,
        row.payload.clone(),
    )
}

/// Correlation id carried through logs from Relay publish to Applier apply.
/// Derived from the outbox row id for the same reason the envelope id is:
/// stable across republishes of the same row.
fn trace_id_for(outbox_row_id: Uuid) -> String {
    outbox_row_id.to_string()
}

fn map_repo_err(e: ledger_db::RepoError) -> sqlx::Error {
    match e {
        ledger_db::RepoError::Database(e) => e,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ledger_db::models::OutboxStatus;
    use serde_json::json;

    fn sample_row(event_type: &str, payload: serde_json::Value) -> OutboxEvent {
        OutboxEvent {
            id: Uuid::new_v4(),
            aggregate_type: "transaction".to_string(),
            aggregate_id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            payload,
            status: OutboxStatus::Pending,
            publish_attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            published_at: None,
        }
    }

    #[test]
    fn envelope_lifts_idempotency_key_for_transaction_created() {
        let row = sample_row(
            EVENT_TYPE_TRANSACTION_CREATED,
            json!({"idempotency_key": "k1", "transaction_id": Uuid::new_v4()}),
        );
        let envelope = build_envelope(&row);
        assert_eq!(envelope.idempotency_key, "k1");
    }

    #[test]
    fn envelope_id_is_deterministic_across_rebuilds() {
        let row = sample_row(EVENT_TYPE_TRANSACTION_CREATED, json!({"idempotency_key": "k1"}));
        let first = build_envelope(&row);
        let second = build_envelope(&row);
        assert_eq!(first.event_id, second.event_id);
        assert_eq!(first.event_id, deterministic_envelope_id(row.id));
    }

    #[test]
    fn envelope_leaves_idempotency_key_empty_for_unknown_event_types() {
        let row = sample_row("account.created", json!({}));
        let envelope = build_envelope(&row);
        assert_eq!(envelope.idempotency_key, "");
    }
}
