//! Boundary E2E test: HTTP -> Ingress -> DB.
//!
//! Hits a real running Ingress instance (`cargo run -p ingress`) over HTTP,
//! the way sibling services in this workspace are boundary-tested. Requires
//! `INGRESS_BASE_URL` (default `http://localhost:8080`) and `API_KEY` to
//! point at a live instance with a reachable, migrated database.

use serde_json::{json, Value};
use serial_test::serial;

fn base_url() -> String {
    std::env::var("INGRESS_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

fn api_key() -> String {
    std::env::var("API_KEY").unwrap_or_else(|_| "test-api-key".to_string())
}

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

async fn create_account(currency: &str) -> Value {
    let resp = client()
        .post(format!("{}/v1/accounts", base_url()))
        .header("X-API-Key", api_key())
        .json(&json!({ "currency": currency }))
        .send()
        .await
        .expect("request to /v1/accounts failed");

    assert_eq!(resp.status(), 201);
    resp.json().await.expect("invalid account JSON")
}

#[tokio::test]
#[serial]
async fn s1_create_transaction_returns_pending_on_first_create() {
    let account = create_account("USD").await;
    let idempotency_key = format!("e2e-{}", uuid::Uuid::new_v4());

    let resp = client()
        .post(format!("{}/v1/transactions", base_url()))
        .header("X-API-Key", api_key())
        .json(&json!({
            "account_id": account["id"],
            "amount_cents": 10_000,
            "currency": "USD",
            "type": "CREDIT",
            "idempotency_key": idempotency_key,
        }))
        .send()
        .await
        .expect("request to /v1/transactions failed");

    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["amount_cents"], 10_000);
}

#[tokio::test]
#[serial]
async fn s2_replaying_the_same_idempotency_key_returns_the_same_transaction() {
    let account = create_account("USD").await;
    let idempotency_key = format!("e2e-{}", uuid::Uuid::new_v4());

    let body = json!({
        "account_id": account["id"],
        "amount_cents": 2_500,
        "currency": "USD",
        "type": "DEBIT",
        "idempotency_key": idempotency_key,
    });

    let first = client()
        .post(format!("{}/v1/transactions", base_url()))
        .header("X-API-Key", api_key())
        .json(&body)
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();

    // Replay with different non-key fields: the original amount must win.
    let replay_body = json!({
        "account_id": account["id"],
        "amount_cents": 999_999,
        "currency": "USD",
        "type": "DEBIT",
        "idempotency_key": idempotency_key,
    });

    let second = client()
        .post(format!("{}/v1/transactions", base_url()))
        .header("X-API-Key", api_key())
        .json(&replay_body)
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();

    assert_eq!(first["id"], second["id"]);
    assert_eq!(second["amount_cents"], 2_500, "replay must not overwrite the original amount");
}

#[tokio::test]
#[serial]
async fn rejects_non_positive_amount_with_400() {
    let account = create_account("USD").await;

    let resp = client()
        .post(format!("{}/v1/transactions", base_url()))
        .header("X-API-Key", api_key())
        .json(&json!({
            "account_id": account["id"],
            "amount_cents": 0,
            "currency": "USD",
            "type": "CREDIT",
            "idempotency_key": "whatever",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
}

#[tokio::test]
#[serial]
async fn unknown_account_returns_404() {
    let resp = client()
        .post(format!("{}/v1/transactions", base_url()))
        .header("X-API-Key", api_key())
        .json(&json!({
            "account_id": uuid::Uuid::new_v4(),
            "amount_cents": 100,
            "currency": "USD",
            "type": "CREDIT",
            "idempotency_key": format!("e2e-{}", uuid::Uuid::new_v4()),
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 404);
}

#[tokio::test]
#[serial]
async fn missing_api_key_returns_401() {
    let resp = client()
        .get(format!("{}/v1/transactions", base_url()))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Unauthorized");
}
