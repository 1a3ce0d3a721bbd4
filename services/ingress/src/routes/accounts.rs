use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub currency: String,
}

pub async fn create_account(
    State(pool): State<PgPool>,
    Json(body): Json<CreateAccountRequest>,
) -> Result<(axum::http::StatusCode, Json<ledger_db::models::Account>), ApiError> {
    if body.currency.trim().is_empty() {
        return Err(ApiError::Validation("currency must not be empty".to_string()));
    }

    let account = ledger_db::account_repo::create(&pool, &body.currency).await?;
    Ok((axum::http::StatusCode::CREATED, Json(account)))
}

pub async fn get_account(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
) -> Result<Json<ledger_db::models::Account>, ApiError> {
    let account = ledger_db::account_repo::find_by_id(&pool, id)
        .await?
        .ok_or(ApiError::AccountNotFound)?;

    Ok(Json(account))
}
