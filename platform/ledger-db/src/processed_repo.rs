use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::RepoError;

pub async fn exists(
    tx: &mut Transaction<'_, Postgres>,
    event_id: Uuid,
) -> Result<bool, RepoError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM processed_events WHERE event_id = $1)")
            .bind(event_id)
            .fetch_one(&mut **tx)
            .await?;

    Ok(exists)
}

/// Cheap pre-check run before opening the write transaction in the Applier's
/// retry loop, so a redelivered already-applied envelope short-circuits
/// without taking a row lock on the account.
pub async fn exists_pool(pool: &PgPool, event_id: Uuid) -> Result<bool, RepoError> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM processed_events WHERE event_id = $1)")
            .bind(event_id)
            .fetch_one(pool)
            .await?;

    Ok(exists)
}

/// Claim an envelope id for this transaction. Returns `true` if this call
/// inserted the row (the caller owns applying the side effects), `false` if
/// a conflicting row already existed (another worker — or a prior attempt of
/// this one — already claimed it; the transaction should commit as a no-op).
pub async fn try_claim_tx(
    tx: &mut Transaction<'_, Postgres>,
    event_id: Uuid,
    transaction_id: Uuid,
) -> Result<bool, RepoError> {
    let result = sqlx::query(
        r#"
        INSERT INTO processed_events (event_id, transaction_id)
        VALUES ($1, $2)
        ON CONFLICT (event_id) DO NOTHING
        "#,
    )
    .bind(event_id)
    .bind(transaction_id)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected() == 1)
}
