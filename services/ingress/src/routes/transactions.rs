use axum::extract::{Path, Query, State};
use axum::Json;
use ledger_db::models::{Transaction, TransactionDirection};
use ledger_log::{TransactionCreatedPayload, EVENT_TYPE_TRANSACTION_CREATED};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub account_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    #[serde(rename = "type")]
    pub direction: TransactionDirection,
    pub idempotency_key: String,
    pub metadata: Option<serde_json::Value>,
}

/// Idempotent create under serializable isolation, with a unique-
/// constraint race fallback for concurrent first-time creates.
pub async fn create_transaction(
    State(pool): State<PgPool>,
    Json(body): Json<CreateTransactionRequest>,
) -> Result<(axum::http::StatusCode, Json<Transaction>), ApiError> {
    if body.amount_cents <= 0 {
        return Err(ApiError::Validation("amount_cents must be positive".to_string()));
    }
    if body.idempotency_key.trim().is_empty() {
        return Err(ApiError::Validation("idempotency_key must not be empty".to_string()));
    }

    let outcome = tokio::time::timeout(crate::config::HANDLER_TIMEOUT, try_create(&pool, &body))
        .await
        .map_err(|_| ApiError::Timeout)?;

    match outcome {
        Ok(tx) => Ok((axum::http::StatusCode::CREATED, Json(tx))),
        Err(ApiError::Database(sqlx::Error::Database(db_err))) if db_err.code().as_deref() == Some("23505") => {
            // Lost the race to a concurrent insert of the same
            // (account_id, idempotency_key). The winner's row is now
            // committed and visible; return it instead of failing.
            let row = find_winning_row(&pool, body.account_id, &body.idempotency_key).await?;
            Ok((axum::http::StatusCode::CREATED, Json(row)))
        }
        Err(e) => Err(e),
    }
}

async fn try_create(pool: &PgPool, body: &CreateTransactionRequest) -> Result<Transaction, ApiError> {
    let mut tx = pool.begin().await.map_err(ApiError::Database)?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
        .execute(&mut *tx)
        .await
        .map_err(ApiError::Database)?;

    if let Some(existing) = ledger_db::transaction_repo::find_by_account_and_idempotency_key_tx(
        &mut tx,
        body.account_id,
        &body.idempotency_key,
    )
    .await?
    {
        tx.commit().await.map_err(ApiError::Database)?;
        return Ok(existing);
    }

    let account = ledger_db::account_repo::find_by_id_tx(&mut tx, body.account_id)
        .await?
        .ok_or(ApiError::AccountNotFound)?;

    if !ledger_db::account_repo::is_active(&account) {
        return Err(ApiError::AccountInactive);
    }

    let transaction = ledger_db::transaction_repo::insert_pending_tx(
        &mut tx,
        body.account_id,
        body.amount_cents,
        &body.currency,
        body.direction,
        &body.idempotency_key,
        body.metadata.clone(),
    )
    .await?;

    let payload = TransactionCreatedPayload {
        transaction_id: transaction.id,
        account_id: transaction.account_id,
        amount_cents: transaction.amount_cents,
        currency: transaction.currency.clone(),
        direction: direction_str(body.direction).to_string(),
        idempotency_key: transaction.idempotency_key.clone(),
        metadata: transaction.metadata.clone(),
    };
    let payload_json = serde_json::to_value(&payload).map_err(|e| {
        ApiError::Validation(format!("failed to encode transaction.created payload: {e}"))
    })?;

    ledger_db::outbox_repo::insert_tx(
        &mut tx,
        "transaction",
        transaction.id,
        EVENT_TYPE_TRANSACTION_CREATED,
        payload_json,
    )
    .await?;

    tx.commit().await.map_err(ApiError::Database)?;

    Ok(transaction)
}

async fn find_winning_row(
    pool: &PgPool,
    account_id: Uuid,
    idempotency_key: &str,
) -> Result<Transaction, ApiError> {
    let mut tx = pool.begin().await.map_err(ApiError::Database)?;
    let row = ledger_db::transaction_repo::find_by_account_and_idempotency_key_tx(
        &mut tx,
        account_id,
        idempotency_key,
    )
    .await?
    .ok_or_else(|| ApiError::Validation("transaction disappeared after constraint race".to_string()))?;
    tx.commit().await.map_err(ApiError::Database)?;
    Ok(row)
}

fn direction_str(direction: TransactionDirection) -> &'static str {
    match direction {
        TransactionDirection::Debit => "DEBIT",
        TransactionDirection::Credit => "CREDIT",
    }
}

pub async fn get_transaction(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
) -> Result<Json<Transaction>, ApiError> {
    let transaction = ledger_db::transaction_repo::find_by_id(&pool, id)
        .await?
        .ok_or(ApiError::TransactionNotFound)?;

    Ok(Json(transaction))
}

#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    pub account_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListTransactionsResponse {
    pub transactions: Vec<Transaction>,
    pub limit: i64,
    pub offset: i64,
}

pub async fn list_transactions(
    State(pool): State<PgPool>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<ListTransactionsResponse>, ApiError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 100);
    let offset = query.offset.unwrap_or(0).max(0);

    let transactions =
        ledger_db::transaction_repo::list(&pool, query.account_id, limit, offset).await?;

    Ok(Json(ListTransactionsResponse {
        transactions,
        limit,
        offset,
    }))
}
