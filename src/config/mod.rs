//! Environment configuration.
//!
//! `.env` is loaded by `main` through `dotenvy` before `Config::from_env`
//! runs, so both real environment variables and `.env` entries apply.

use std::env;
use std::net::{IpAddr, SocketAddr};

use thiserror::Error;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::with_security_headers;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/gatepass";
const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    /// Absent means notifications go to the log only.
    pub telegram_bot_token: Option<String>,
    pub telegram_api_url: String,
    /// Chat ids that receive a message for every redemption attempt.
    pub admin_ids: Vec<String>,
    pub cors_allowed_origins: Option<String>,
    pub production: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            database_max_connections: 5,
            host: "0.0.0.0".to_string(),
            port: 8000,
            telegram_bot_token: None,
            telegram_api_url: DEFAULT_TELEGRAM_API_URL.to_string(),
            admin_ids: Vec::new(),
            cors_allowed_origins: None,
            production: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_max_connections = match get("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => parse_number("DATABASE_MAX_CONNECTIONS", &raw)?,
            None => defaults.database_max_connections,
        };
        let port = match get("PORT") {
            Some(raw) => parse_number("PORT", &raw)?,
            None => defaults.port,
        };
        let admin_ids = match get("ADMIN_IDS") {
            Some(raw) => parse_admin_ids(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or(defaults.database_url),
            database_max_connections,
            host: get("HOST").unwrap_or(defaults.host),
            port,
            telegram_bot_token: get("TELEGRAM_BOT_TOKEN"),
            telegram_api_url: get("TELEGRAM_API_URL").unwrap_or(defaults.telegram_api_url),
            admin_ids,
            cors_allowed_origins: get("CORS_ALLOWED_ORIGINS"),
            production: get("RUST_ENV")
                .map(|v| v.to_lowercase() == "production")
                .unwrap_or(false),
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.host.parse().map_err(|_| ConfigError::InvalidValue {
            key: "HOST",
            value: self.host.clone(),
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}

/// Comma-separated Telegram chat ids. `0` is the historical "no admin"
/// placeholder and is skipped.
fn parse_admin_ids(raw: &str) -> Result<Vec<String>, ConfigError> {
    let mut ids = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let id: i64 = parse_number("ADMIN_IDS", part)?;
        if id != 0 {
            ids.push(id.to_string());
        }
    }
    Ok(ids)
}
