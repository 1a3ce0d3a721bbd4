//! # ledger-db
//!
//! The schema and repositories shared by all three services. Every durable
//! fact in the pipeline lives here: accounts, transactions, the outbox, and
//! the Applier's dedup table. No service holds ledger state in memory across
//! a restart — it is read back from these tables.

pub mod account_repo;
pub mod error;
pub mod models;
pub mod outbox_repo;
pub mod processed_repo;
pub mod transaction_repo;

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

pub use error::RepoError;

/// Bounded pool: 25 open, 5 idle, 5-minute connection lifetime.
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(25)
        .min_connections(5)
        .max_lifetime(Duration::from_secs(300))
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
