use std::env;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_BINANCE_API_URL: &str = "https://api.binance.com";
const DEFAULT_SESSION_TTL_SECS: u64 = 300;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_token: String,
    pub database_url: String,
    pub binance_api_url: String,
    pub session_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let telegram_token = get("TELEGRAM_BOT_TOKEN").ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;

        // DATABASE_URL приоритетнее, иначе собираем из частей
        let database_url = match get("DATABASE_URL") {
            Some(url) => url,
            None => {
                let host = get("DB_HOST").ok_or(ConfigError::Missing("DATABASE_URL or DB_HOST"))?;
                let port = get("DB_PORT").unwrap_or_else(|| "5432".to_string());
                let user = get("DB_USER").ok_or(ConfigError::Missing("DB_USER"))?;
                let pass = get("DB_PASS").unwrap_or_default();
                let name = get("DB_NAME").ok_or(ConfigError::Missing("DB_NAME"))?;
                format!("postgres://{}:{}@{}:{}/{}", user, pass, host, port, name)
            }
        };

        let binance_api_url =
            get("BINANCE_API_URL").unwrap_or_else(|| DEFAULT_BINANCE_API_URL.to_string());

        let secs = |name: &'static str, default: u64| -> Result<Duration, ConfigError> {
            match get(name) {
                None => Ok(Duration::from_secs(default)),
                Some(value) => value
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|v| *v > 0)
                    .map(Duration::from_secs)
                    .ok_or(ConfigError::Invalid { name, value }),
            }
        };

        Ok(Config {
            telegram_token,
            database_url,
            binance_api_url,
            session_ttl: secs("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?,
            sweep_interval: secs("SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS)?,
        })
    }
}
