use std::env;

/// Configuration parsed from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub kafka_brokers: String,
    pub transactions_topic: String,
    pub dlq_topic: String,
    pub consumer_group: String,
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

        let dlq_topic =
            env::var("KAFKA_DLQ_TOPIC").unwrap_or_else(|_| "transactions.dlq".to_string());

        let consumer_group = env::var("WORKER_CONSUMER_GROUP")
            .unwrap_or_else(|_| "transaction-workers".to_string());

        Ok(Config {
            database_url,
            kafka_brokers,
            transactions_topic,
            dlq_topic,
            consumer_group,
        })
    }
}
