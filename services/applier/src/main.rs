mod apply;
mod config;
mod consumer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ledger_log::{KafkaConsumer, KafkaProducer};
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

    tracing::info!(
        brokers = %config.kafka_brokers,
        group = %config.consumer_group,
        topic = %config.transactions_topic,
        "connecting to kafka"
    );
    let consumer = KafkaConsumer::new(
        &config.kafka_brokers,
        &config.consumer_group,
        &[config.transactions_topic.as_str()],
    )
    .expect("failed to create consumer");
    let dlq_producer = KafkaProducer::new(&config.kafka_brokers).expect("failed to create producer");

    let shutting_down = Arc::new(AtomicBool::new(false));
    {
        let shutting_down = shutting_down.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            tracing::info!("shutdown signal received, finishing in-flight message before stopping");
            shutting_down.store(true, Ordering::SeqCst);
        });
    }

    tracing::info!("applier starting");
    consumer::run(&pool, &consumer, &dlq_producer, &config.dlq_topic, shutting_down).await;
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
