use std::env;
use std::net::SocketAddr;

use dotenvy::dotenv;
use log::LevelFilter;
use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:7878";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Shared secret expected as a bearer token on scheduler and worker calls.
    pub cron_secret: Option<String>,
    pub log_level: LevelFilter,
}

impl Config {
    /// Reads `.env` (if present) and then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let bind_addr = match lookup("BIND_ADDR") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "BIND_ADDR",
                value,
            })?,
            None => DEFAULT_BIND_ADDR.parse().map_err(|_| ConfigError::Invalid {
                key: "BIND_ADDR",
                value: DEFAULT_BIND_ADDR.to_string(),
            })?,
        };

        let cron_secret = lookup("CRON_SECRET")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let log_level = match lookup("LOG_LEVEL") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "LOG_LEVEL",
                value,
            })?,
            None => LevelFilter::Info,
        };

        Ok(Config {
            database_url,
            bind_addr,
            cron_secret,
            log_level,
        })
    }
}
