use ledger_log::Retriable;
use thiserror::Error;

/// Errors surfaced by the repository layer.
///
/// `Retriable` classifies a `sqlx::Error` the way the Applier's retry loop
/// needs it classified: connection and serialization-conflict failures are
/// transient, everything else (constraint violations the caller is expected
/// to already have handled, decode errors) is not.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Retriable for RepoError {
    fn is_retriable(&self) -> bool {
        match self {
            RepoError::Database(e) => is_transient_db_error(e),
        }
    }
}

/// Connection drops and serialization failures (SQLSTATE `40001`) are worth
/// retrying; anything else (a bad query, a type mismatch) will just fail the
/// same way again.
pub fn is_transient_db_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => true,
        sqlx::Error::Database(db_err) => {
            matches!(db_err.code().as_deref(), Some("40001") | Some("40P01"))
        }
        _ => false,
    }
}
