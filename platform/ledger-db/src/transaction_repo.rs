use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::RepoError;
use crate::models::{TransactionDirection, TransactionStatus};

pub use crate::models::Transaction as TransactionRow;

/// Look up an existing transaction by the Ingress' uniqueness key. Used to
/// detect idempotent replay before a new row is inserted.
pub async fn find_by_account_and_idempotency_key_tx(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
    idempotency_key: &str,
) -> Result<Option<TransactionRow>, RepoError> {
    let row = sqlx::query_as::<_, TransactionRow>(
        r#"
        SELECT id, account_id, amount_cents, currency, direction, status,
               idempotency_key, failure_reason, metadata, created_at, updated_at
        FROM transactions
        WHERE account_id = $1 AND idempotency_key = $2
        "#,
    )
    .bind(account_id)
    .bind(idempotency_key)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row)
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_pending_tx(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
    amount_cents: i64,
    currency: &str,
    direction: TransactionDirection,
    idempotency_key: &str,
    metadata: Option<serde_json::Value>,
) -> Result<TransactionRow, RepoError> {
    let row = sqlx::query_as::<_, TransactionRow>(
        r#"
        INSERT INTO transactions
            (account_id, amount_cents, currency, direction, idempotency_key, metadata)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, account_id, amount_cents, currency, direction, status,
                  idempotency_key, failure_reason, metadata, created_at, updated_at
        "#,
    )
    .bind(account_id)
    .bind(amount_cents)
    .bind(currency)
    .bind(direction)
    .bind(idempotency_key)
    .bind(metadata)
    .fetch_one(&mut **tx)
    .await?;

    Ok(row)
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<TransactionRow>, RepoError> {
    let row = sqlx::query_as::<_, TransactionRow>(
        r#"
        SELECT id, account_id, amount_cents, currency, direction, status,
               idempotency_key, failure_reason, metadata, created_at, updated_at
        FROM transactions
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn list(
    pool: &PgPool,
    account_id: Option<Uuid>,
    limit: i64,
    offset: i64,
) -> Result<Vec<TransactionRow>, RepoError> {
    let rows = match account_id {
        Some(account_id) => {
            sqlx::query_as::<_, TransactionRow>(
                r#"
                SELECT id, account_id, amount_cents, currency, direction, status,
                       idempotency_key, failure_reason, metadata, created_at, updated_at
                FROM transactions
                WHERE account_id = $1
                ORDER BY created_at DESC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(account_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, TransactionRow>(
                r#"
                SELECT id, account_id, amount_cents, currency, direction, status,
                       idempotency_key, failure_reason, metadata, created_at, updated_at
                FROM transactions
                ORDER BY created_at DESC
                LIMIT $1 OFFSET $2
                "#,
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
    };

    Ok(rows)
}

/// `PENDING → PROCESSING`. Cosmetic: the Applier does not fail if the row
/// has already moved past `PENDING` (e.g. on a retried attempt).
pub async fn mark_processing_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> Result<(), RepoError> {
    sqlx::query(
        r#"
        UPDATE transactions
        SET status = 'PROCESSING', updated_at = now()
        WHERE id = $1 AND status = 'PENDING'
        "#,
    )
    .bind(id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn mark_processed_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> Result<(), RepoError> {
    sqlx::query(
        r#"
        UPDATE transactions
        SET status = 'PROCESSED', updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn mark_failed_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    failure_reason: &str,
) -> Result<(), RepoError> {
    sqlx::query(
        r#"
        UPDATE transactions
        SET status = 'FAILED', failure_reason = $2, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(failure_reason)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub fn is_terminal(status: TransactionStatus) -> bool {
    matches!(status, TransactionStatus::Processed | TransactionStatus::Failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processed_and_failed_are_terminal() {
        assert!(is_terminal(TransactionStatus::Processed));
        assert!(is_terminal(TransactionStatus::Failed));
        assert!(!is_terminal(TransactionStatus::Pending));
        assert!(!is_terminal(TransactionStatus::Processing));
    }
}
