//! # Envelope
//!
//! Wire format transported over the `transactions` / `transactions.dlq` topics.
//!
//! ## Envelope Fields
//!
//! - `event_id`: dedup key on the Applier side. Derived deterministically from
//!   the outbox row id, so a relay republish of the same row is absorbed rather
//!   than treated as a new event.
//! - `event_type`: e.g. `transaction.created`.
//! - `occurred_at`: timestamp of the outbox row, not of publish.
//! - `trace_id`: opaque correlation id, carried through logs end to end.
//! - `idempotency_key`: denormalized from the payload for observability only;
//!   not authoritative (the DB unique constraint is).
//! - `aggregate_id`: also the log partition key, so per-account ordering holds.
//! - `payload`: opaque JSON, shaped per `event_type`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fixed namespace used only to derive deterministic envelope ids from outbox
/// row ids via UUIDv5. Never used for anything else.
const ENVELOPE_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6f, 0x75, 0x74, 0x62, 0x6f, 0x78, 0x2d, 0x65, 0x6e, 0x76, 0x65, 0x6c, 0x6f, 0x70, 0x65, 0x00,
]);

/// Derive the envelope id for a given outbox row id.
///
/// Deterministic: the same outbox row always maps to the same envelope id, so
/// republishing an already-published row produces a dedup key the Applier has
/// already seen rather than a new one. See `processed_events`.
pub fn deterministic_envelope_id(outbox_row_id: Uuid) -> Uuid {
    Uuid::new_v5(&ENVELOPE_ID_NAMESPACE, outbox_row_id.as_bytes())
}

pub const EVENT_TYPE_TRANSACTION_CREATED: &str = "transaction.created";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event_id: Uuid,
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub trace_id: String,
    pub idempotency_key: String,
    pub aggregate_id: Uuid,
    pub payload: serde_json::Value,
}

impl Envelope {
    pub fn new(
        event_id: Uuid,
        event_type: impl Into<String>,
        occurred_at: DateTime<Utc>,
        trace_id: impl Into<String>,
        idempotency_key: impl Into<String>,
        aggregate_id: Uuid,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id,
            event_type: event_type.into(),
            occurred_at,
            trace_id: trace_id.into(),
            idempotency_key: idempotency_key.into(),
            aggregate_id,
            payload,
        }
    }
}

/// `transaction.created` payload, embedded as `Envelope::payload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionCreatedPayload {
    pub transaction_id: Uuid,
    pub account_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    #[serde(rename = "type")]
    pub direction: String,
    pub idempotency_key: String,
    pub metadata: Option<serde_json::Value>,
}

/// Headers carried on the `transactions` topic.
pub const HEADER_EVENT_TYPE: &str = "event_type";
pub const HEADER_AGGREGATE_ID: &str = "aggregate_id";

/// Additional headers carried on the `transactions.dlq` topic.
pub const HEADER_DLQ_REASON: &str = "dlq_reason";
pub const HEADER_ORIGINAL_PARTITION: &str = "original_partition";
pub const HEADER_ORIGINAL_OFFSET: &str = "original_offset";

/// Validate the structural fields of an envelope parsed from raw JSON, before
/// attempting to decode its typed payload.
pub fn validate_envelope_fields(envelope: &serde_json::Value) -> Result<(), String> {
    envelope
        .get("event_id")
        .and_then(|v| v.as_str())
        .ok_or("Missing or invalid event_id")?;

    envelope
        .get("occurred_at")
        .and_then(|v| v.as_str())
        .ok_or("Missing or invalid occurred_at")?;

    let event_type = envelope
        .get("event_type")
        .and_then(|v| v.as_str())
        .ok_or("Missing or invalid event_type")?;
    if event_type.is_empty() {
        return Err("event_type cannot be empty".to_string());
    }

    envelope
        .get("aggregate_id")
        .and_then(|v| v.as_str())
        .ok_or("Missing or invalid aggregate_id")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_id_derivation_is_deterministic() {
        let row_id = Uuid::new_v4();
        assert_eq!(
            deterministic_envelope_id(row_id),
            deterministic_envelope_id(row_id)
        );
    }

    #[test]
    fn envelope_id_derivation_differs_across_rows() {
        let a = deterministic_envelope_id(Uuid::new_v4());
        let b = deterministic_envelope_id(Uuid::new_v4());
        assert_ne!(a, b);
    }

    #[test]
    fn transaction_created_payload_round_trips() {
        let payload = TransactionCreatedPayload {
            transaction_id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            amount_cents: 10_000,
            currency: "USD".to_string(),
            direction: "CREDIT".to_string(),
            idempotency_key: "k1".to_string(),
            metadata: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        let back: TransactionCreatedPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back.transaction_id, payload.transaction_id);
        assert_eq!(back.amount_cents, payload.amount_cents);
    }

    #[test]
    fn validate_envelope_fields_rejects_missing_aggregate_id() {
        let envelope = json!({
            "event_id": "550e8400-e29b-41d4-a716-446655440000",
            "occurred_at": "2024-01-01T00:00:00Z",
            "event_type": "transaction.created",
        });
        assert!(validate_envelope_fields(&envelope).is_err());
    }

    #[test]
    fn validate_envelope_fields_accepts_well_formed_envelope() {
        let envelope = json!({
            "event_id": "550e8400-e29b-41d4-a716-446655440000",
            "occurred_at": "2024-01-01T00:00:00Z",
            "event_type": "transaction.created",
            "aggregate_id": "660e8400-e29b-41d4-a716-446655440000",
        });
        assert!(validate_envelope_fields(&envelope).is_ok());
    }
}
