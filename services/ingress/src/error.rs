use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Ingress-facing errors, mapped directly onto the REST surface.
/// 5xx variants never expose internal error text to the caller.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("account not found")]
    AccountNotFound,

    #[error("account is inactive")]
    AccountInactive,

    #[error("transaction not found")]
    TransactionNotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("request timed out")]
    Timeout,
}

impl From<ledger_db::RepoError> for ApiError {
    fn from(err: ledger_db::RepoError) -> Self {
        match err {
            ledger_db::RepoError::Database(e) => ApiError::Database(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::AccountNotFound => (StatusCode::NOT_FOUND, "account not found".to_string()),
            ApiError::AccountInactive => {
                (StatusCode::BAD_REQUEST, "account is inactive".to_string())
            }
            ApiError::TransactionNotFound => {
                (StatusCode::NOT_FOUND, "transaction not found".to_string())
            }
            ApiError::Database(e) => {
                tracing::error!(error = %e, "database error handling request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                )
            }
            ApiError::Timeout => (
                StatusCode::SERVICE_UNAVAILABLE,
                "request timed out".to_string(),
            ),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
