mod auth;
mod config;
mod error;
mod routes;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use config::Config;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env().expect("invalid configuration");

    tracing::info!("connecting to database");
    let pool = ledger_db::init_pool(&config.database_url)
        .await
        .expect("failed to connect to database");

    tracing::info!("running migrations");
    ledger_db::run_migrations(&pool)
        .await
        .expect("failed to run migrations");

    let v1_routes = Router::new()
        .route("/accounts", post(routes::accounts::create_account))
        .route("/accounts/{id}", get(routes::accounts::get_account))
        .route(
            "/transactions",
            post(routes::transactions::create_transaction)
                .get(routes::transactions::list_transactions),
        )
        .route("/transactions/{id}", get(routes::transactions::get_transaction))
        .layer(middleware::from_fn_with_state(
            auth::ApiKeyState {
                api_key: config.api_key.clone(),
            },
            auth::require_api_key,
        ));

    let app = Router::new()
        .route("/health", get(routes::health::health))
        .nest("/v1", v1_routes)
        .layer(middleware::from_fn(auth::trace_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(pool);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    tracing::info!(%addr, "ingress listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");
}

/// Stops accepting new requests on SIGINT/SIGTERM; `axum::serve` drains
/// in-flight handlers under its own grace period before returning.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining in-flight requests");
    tokio::time::sleep(Duration::from_millis(100)).await;
}
