use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::RepoError;
use crate::models::OutboxEvent;

pub async fn insert_tx(
    tx: &mut Transaction<'_, Postgres>,
    aggregate_type: &str,
    aggregate_id: Uuid,
    event_type: &str,
    payload: serde_json::Value,
) -> Result<OutboxEvent, RepoError> {
    let row = sqlx::query_as::<_, OutboxEvent>(
        r#"
        INSERT INTO outbox_events (aggregate_type, aggregate_id, event_type, payload)
        VALUES ($1, $2, $3, $4)
        RETURNING id, aggregate_type, aggregate_id, event_type, payload, status,
                  publish_attempts, last_error, created_at, published_at
        "#,
    )
    .bind(aggregate_type)
    .bind(aggregate_id)
    .bind(event_type)
    .bind(payload)
    .fetch_one(&mut **tx)
    .await?;

    Ok(row)
}

/// Claim up to `batch_size` pending rows, skipping rows already locked by
/// another replica's in-flight tick. The caller must keep `tx` open for the
/// whole batch: the row locks (and thus the cross-replica exclusion) last
/// only as long as the transaction does.
pub async fn claim_batch_tx(
    tx: &mut Transaction<'_, Postgres>,
    batch_size: i64,
) -> Result<Vec<OutboxEvent>, RepoError> {
    let rows = sqlx::query_as::<_, OutboxEvent>(
        r#"
        SELECT id, aggregate_type, aggregate_id, event_type, payload, status,
               publish_attempts, last_error, created_at, published_at
        FROM outbox_events
        WHERE status = 'PENDING'
        ORDER BY created_at ASC
        LIMIT $1
        FOR UPDATE SKIP LOCKED
        "#,
    )
    .bind(batch_size)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows)
}

pub async fn mark_published_tx(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<(), RepoError> {
    sqlx::query(
        r#"
        UPDATE outbox_events
        SET status = 'PUBLISHED', published_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn mark_publish_failed_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    error: &str,
) -> Result<(), RepoError> {
    sqlx::query(
        r#"
        UPDATE outbox_events
        SET publish_attempts = publish_attempts + 1, last_error = $2
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(error)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Count of rows still awaiting publish — the back-pressure signal operators
/// watch to tell whether the Relay is keeping up with the Ingress.
pub async fn pending_count(pool: &PgPool) -> Result<i64, RepoError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM outbox_events WHERE status = 'PENDING'")
            .fetch_one(pool)
            .await?;

    Ok(count)
}
