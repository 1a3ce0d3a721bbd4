use std::env;
use std::time::Duration;

/// Configuration parsed from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub api_port: u16,
    pub api_key: String,
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

        let api_port: u16 = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| "API_PORT must be a valid u16".to_string())?;

        let api_key = env::var("API_KEY").map_err(|_| "API_KEY must be set".to_string())?;

        Ok(Config {
            database_url,
            api_port,
            api_key,
        })
    }
}

/// Ingress handler transaction bound: 10s.
pub const HANDLER_TIMEOUT: Duration = Duration::from_secs(10);
