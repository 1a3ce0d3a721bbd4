mod config;
mod relay;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ledger_log::KafkaProducer;
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

    tracing::info!(brokers = %config.kafka_brokers, "connecting to kafka");
    let producer = KafkaProducer::new(&config.kafka_brokers).expect("failed to create producer");

    let shutting_down = Arc::new(AtomicBool::new(false));
    {
        let shutting_down = shutting_down.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            tracing::info!("shutdown signal received, finishing current batch before stopping");
            shutting_down.store(true, Ordering::SeqCst);
        });
    }

    tracing::info!(
        poll_interval_secs = config.poll_interval.as_secs(),
        batch_size = config.batch_size,
        "relay starting"
    );

    let mut ticker = tokio::time::interval(config.poll_interval);
    while !shutting_down.load(Ordering::SeqCst) {
        ticker.tick().await;

        let tick_result = tokio::time::timeout(
            config::BATCH_TIMEOUT,
            relay::run_tick(&pool, &producer, &config.transactions_topic, config.batch_size),
        )
        .await;

        match tick_result {
            Ok(Ok(report)) => {
                if report.claimed > 0 {
                    tracing::info!(
                        claimed = report.claimed,
                        published = report.published,
                        failed = report.failed,
                        "relay tick complete"
                    );
                }
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "relay tick failed");
            }
            Err(_) => {
                tracing::error!("relay tick exceeded 30s timeout");
            }
        }

        log_outbox_lag(&pool).await;
    }

    tracing::info!("relay stopped");
}

/// `outbox_lag` observability: the count of rows still awaiting publish.
/// There is no enforced back-pressure on the Ingress above this; operators
/// watch this value and react (see DESIGN.md).
async fn log_outbox_lag(pool: &sqlx::PgPool) {
    match ledger_db::outbox_repo::pending_count(pool).await {
        Ok(count) if count > 0 => {
            tracing::info!(outbox_lag = count, "outbox rows still pending publish");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "failed to query outbox lag");
        }
    }
}

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
}
