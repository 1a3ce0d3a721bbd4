//! The per-envelope apply contract (§4.3 steps a-i).
//!
//! [`apply_once`] is the single retryable unit of work: dedup check, claim,
//! balance mutation, all inside one serializable transaction. A transient
//! DB error bubbles up as [`ApplyError`] for the caller's retry loop to
//! retry; a business failure (account not found, currency mismatch,
//! insufficient balance) is recorded durably and returned as `Ok` — it is a
//! terminal *success* of the pipeline, not a retryable error.

use ledger_db::models::TransactionDirection;
use ledger_db::{account_repo, processed_repo, transaction_repo, RepoError};
use ledger_log::{Envelope, Retriable, TransactionCreatedPayload};
use sqlx::PgPool;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The envelope id was already in `processed_events`; no side effects.
    Duplicate,
    /// Balance mutated, transaction marked `PROCESSED`.
    Processed,
    /// Terminal business failure; transaction marked `FAILED` with this reason.
    Failed(String),
}

#[derive(Debug, thiserror::Error)]
#[error("transient applier error: {0}")]
pub struct ApplyError(#[from] RepoError);

impl Retriable for ApplyError {
    fn is_retriable(&self) -> bool {
        self.0.is_retriable()
    }
}

pub async fn apply_once(
    pool: &PgPool,
    envelope: &Envelope,
    payload: &TransactionCreatedPayload,
) -> Result<ApplyOutcome, ApplyError> {
    if processed_repo::exists_pool(pool, envelope.event_id).await? {
        return Ok(ApplyOutcome::Duplicate);
    }

    let mut tx = pool.begin().await.map_err(RepoError::from)?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
        .execute(&mut *tx)
        .await
        .map_err(RepoError::from)?;

    let claimed =
        processed_repo::try_claim_tx(&mut tx, envelope.event_id, payload.transaction_id).await?;
    if !claimed {
        tx.commit().await.map_err(RepoError::from)?;
        return Ok(ApplyOutcome::Duplicate);
    }

    // Cosmetic: PENDING -> PROCESSING. Never fails on 0 rows affected (the
    // row may already be past PENDING on a retried attempt).
    transaction_repo::mark_processing_tx(&mut tx, payload.transaction_id).await?;

    let account = match account_repo::find_for_update_tx(&mut tx, payload.account_id).await? {
        Some(account) => account,
        None => {
            let reason = format!("account not found: {}", payload.account_id);
            transaction_repo::mark_failed_tx(&mut tx, payload.transaction_id, &reason).await?;
            tx.commit().await.map_err(RepoError::from)?;
            return Ok(ApplyOutcome::Failed(reason));
        }
    };

    if !account_repo::is_active(&account) {
        let reason = format!("account inactive: {}", account.id);
        transaction_repo::mark_failed_tx(&mut tx, payload.transaction_id, &reason).await?;
        tx.commit().await.map_err(RepoError::from)?;
        return Ok(ApplyOutcome::Failed(reason));
    }

    if account.currency != payload.currency {
        let reason = format!(
            "currency mismatch: account currency is {} but transaction currency is {}",
            account.currency, payload.currency
        );
        transaction_repo::mark_failed_tx(&mut tx, payload.transaction_id, &reason).await?;
        tx.commit().await.map_err(RepoError::from)?;
        return Ok(ApplyOutcome::Failed(reason));
    }

    let direction = parse_direction(&payload.direction);
    let signed_delta = match direction {
        TransactionDirection::Credit => payload.amount_cents,
        TransactionDirection::Debit => -payload.amount_cents,
    };
    let new_balance = account.balance_cents + signed_delta;

    if matches!(direction, TransactionDirection::Debit) && new_balance < 0 {
        let reason = format!(
            "insufficient balance: current balance is {} cents, attempted debit of {} cents",
            account.balance_cents, payload.amount_cents
        );
        transaction_repo::mark_failed_tx(&mut tx, payload.transaction_id, &reason).await?;
        tx.commit().await.map_err(RepoError::from)?;
        return Ok(ApplyOutcome::Failed(reason));
    }

    account_repo::update_balance_tx(&mut tx, account.id, new_balance).await?;
    transaction_repo::mark_processed_tx(&mut tx, payload.transaction_id).await?;
    tx.commit().await.map_err(RepoError::from)?;

    Ok(ApplyOutcome::Processed)
}

/// `payload.type` is validated by the Ingress before it is ever written to
/// the outbox, so an unrecognized string here would indicate payload
/// corruption between services; fall back to `DEBIT` (the conservative,
/// balance-checked branch) rather than panic.
fn parse_direction(direction: &str) -> TransactionDirection {
    match direction {
        "CREDIT" => TransactionDirection::Credit,
        _ => TransactionDirection::Debit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_direction_recognizes_credit() {
        assert_eq!(parse_direction("CREDIT"), TransactionDirection::Credit);
    }

    #[test]
    fn parse_direction_defaults_unknown_to_debit() {
        assert_eq!(parse_direction("bogus"), TransactionDirection::Debit);
    }
}
