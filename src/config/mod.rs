use anyhow::Result;
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub max_idle_time_secs: u64,
    pub max_lifetime_secs: u64,
    pub connect_timeout_secs: u64,
    pub monitor_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("REDEMPTION_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("REDEMPTION_SERVICE_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()?;

        let db_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "50".to_string())
            .parse()?;
        let max_idle_time_secs = env::var("DATABASE_MAX_IDLE_TIME_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()?;
        let max_lifetime_secs = env::var("DATABASE_MAX_LIFETIME_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()?;
        let connect_timeout_secs = env::var("DATABASE_CONNECT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()?;
        let monitor_interval_secs = env::var("DATABASE_MONITOR_INTERVAL_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()?;

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                max_connections,
                max_idle_time_secs,
                max_lifetime_secs,
                connect_timeout_secs,
                monitor_interval_secs,
            },
            service_name: "redemption-service".to_string(),
        })
    }
}
