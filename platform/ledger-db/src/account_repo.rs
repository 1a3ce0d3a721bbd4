use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::RepoError;
use crate::models::{Account, AccountStatus};

pub async fn create(pool: &PgPool, currency: &str) -> Result<Account, RepoError> {
    let account = sqlx::query_as::<_, Account>(
        r#"
        INSERT INTO accounts (currency)
        VALUES ($1)
        RETURNING id, currency, balance_cents, status, created_at, updated_at
        "#,
    )
    .bind(currency)
    .fetch_one(pool)
    .await?;

    Ok(account)
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Account>, RepoError> {
    let account = sqlx::query_as::<_, Account>(
        r#"
        SELECT id, currency, balance_cents, status, created_at, updated_at
        FROM accounts
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(account)
}

pub async fn find_by_id_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<Account>, RepoError> {
    let account = sqlx::query_as::<_, Account>(
        r#"
        SELECT id, currency, balance_cents, status, created_at, updated_at
        FROM accounts
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(account)
}

/// Lock the account row for the duration of the caller's transaction.
///
/// The Applier uses this to serialize concurrent applies against the same
/// account: combined with serializable isolation, it gives compare-and-swap
/// semantics on `balance_cents`.
pub async fn find_for_update_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<Account>, RepoError> {
    let account = sqlx::query_as::<_, Account>(
        r#"
        SELECT id, currency, balance_cents, status, created_at, updated_at
        FROM accounts
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(account)
}

pub async fn update_balance_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    new_balance_cents: i64,
) -> Result<(), RepoError> {
    sqlx::query(
        r#"
        UPDATE accounts
        SET balance_cents = $2, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(new_balance_cents)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub fn is_active(account: &Account) -> bool {
    matches!(account.status, AccountStatus::Active)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_status_recognized() {
        let account = Account {
            id: Uuid::new_v4(),
            currency: "USD".to_string(),
            balance_cents: 0,
            status: AccountStatus::Active,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        assert!(is_active(&account));
    }

    #[test]
    fn suspended_status_not_active() {
        let account = Account {
            id: Uuid::new_v4(),
            currency: "USD".to_string(),
            balance_cents: 0,
            status: AccountStatus::Suspended,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        assert!(!is_active(&account));
    }
}
