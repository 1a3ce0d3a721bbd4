use std::env;
use std::time::Duration;

/// Configuration parsed from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub kafka_brokers: String,
    pub transactions_topic: String,
    pub poll_interval: Duration,
    pub batch_size: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let host = env::var("POSTGRES_HOST").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("POSTGRES_PORT").unwrap_or_else(|_| "5432".to_string());
        let user = env::var("POSTGRES_USER").map_err(|_| "POSTGRES_USER must be set".to_string())?;
        let password =
            env::var("POSTGRES_PASSWORD").map_err(|_| "POSTGRES_PASSWORD must be set".to_string())?;
        let db = env::var("POSTGRES_DB").map_err(|_| "POSTGRES_DB must be set".to_string())?;

        let database_url = format!("postgres://{user}:{password}@{host}:{port}/{db}");

        let kafka_brokers =
            env::var("KAFKA_BROKERS").map_err(|_| "KAFKA_BROKERS must be set".to_string())?;

        let transactions_topic = env::var("KAFKA_TRANSACTIONS_TOPIC")
            .unwrap_or_else(|_| "transactions".to_string());

        let poll_interval_secs: u64 = env::var("PUBLISHER_INTERVAL")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .map_err(|_| "PUBLISHER_INTERVAL must be a valid number of seconds".to_string())?;

        let batch_size: i64 = env::var("PUBLISHER_BATCH_SIZE")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .map_err(|_| "PUBLISHER_BATCH_SIZE must be a valid i64".to_string())?;

        Ok(Config {
            database_url,
            kafka_brokers,
            transactions_topic,
            poll_interval: Duration::from_secs(poll_interval_secs),
            batch_size,
        })
    }
}

/// Relay batch bound: 30s end to end.
pub const BATCH_TIMEOUT: Duration = Duration::from_secs(30);
