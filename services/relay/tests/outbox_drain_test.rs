//! Exercises the claim/mark half of the Relay tick against a real database.
//! The publish half (`KafkaProducer`) needs a live broker and is covered by
//! the deterministic-envelope unit tests in `src/relay.rs` instead.

mod common;

use ledger_db::models::TransactionDirection;
use ledger_db::{account_repo, outbox_repo, transaction_repo};
use serde_json::json;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn claimed_rows_marked_published_do_not_reappear_next_claim() {
    let pool = common::get_test_pool().await;
    let account = account_repo::create(&pool, "USD").await.unwrap();

    let mut tx = pool.begin().await.unwrap();
    let transaction = transaction_repo::insert_pending_tx(
        &mut tx,
        account.id,
        2_000,
        "USD",
        TransactionDirection::Credit,
        &format!("relay-test-{}", uuid::Uuid::new_v4()),
        None,
    )
    .await
    .unwrap();
    let outbox_row = outbox_repo::insert_tx(
        &mut tx,
        "transaction",
        transaction.id,
        "transaction.created",
        json!({"transaction_id": transaction.id}),
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let mut tx = pool.begin().await.unwrap();
    let batch = outbox_repo::claim_batch_tx(&mut tx, 100).await.unwrap();
    assert!(batch.iter().any(|r| r.id == outbox_row.id));
    outbox_repo::mark_published_tx(&mut tx, outbox_row.id).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = pool.begin().await.unwrap();
    let next_batch = outbox_repo::claim_batch_tx(&mut tx, 100).await.unwrap();
    tx.rollback().await.unwrap();

    assert!(
        !next_batch.iter().any(|r| r.id == outbox_row.id),
        "a published row must not be claimed again"
    );
}

#[tokio::test]
#[serial]
async fn publish_failure_increments_attempts_and_leaves_row_pending() {
    let pool = common::get_test_pool().await;
    let account = account_repo::create(&pool, "USD").await.unwrap();

    let mut tx = pool.begin().await.unwrap();
    let transaction = transaction_repo::insert_pending_tx(
        &mut tx,
        account.id,
        750,
        "USD",
        TransactionDirection::Debit,
        &format!("relay-test-{}", uuid::Uuid::new_v4()),
        None,
    )
    .await
    .unwrap();
    let outbox_row = outbox_repo::insert_tx(
        &mut tx,
        "transaction",
        transaction.id,
        "transaction.created",
        json!({"transaction_id": transaction.id}),
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let mut tx = pool.begin().await.unwrap();
    outbox_repo::mark_publish_failed_tx(&mut tx, outbox_row.id, "broker unreachable")
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let row: (i32, Option<String>, String) = sqlx::query_as(
        "SELECT publish_attempts, last_error, status::text FROM outbox_events WHERE id = $1",
    )
    .bind(outbox_row.id)
    .fetch_one(&pool)
    .await
    .unwrap();

    assert_eq!(row.0, 1);
    assert_eq!(row.1.as_deref(), Some("broker unreachable"));
    assert_eq!(row.2, "PENDING");
}
