//! Centralized configuration (environment variables + defaults).

use crate::infra::logging::LoggingConfig;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Where rows are kept.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    Postgres { database_url: String },
    /// Process-local tables; nothing survives a restart.
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage: StorageBackend,
    pub bind_addr: String,
    /// Pool size for the Postgres backend.
    pub max_connections: u32,
    /// Prefix of the `X-<app>-alert` response headers.
    pub app_name: String,
    pub logging: LoggingConfig,
}

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_APP_NAME: &str = "stockLedger";

impl AppConfig {
    /// Reads the process environment. Call `dotenv::dotenv().ok()` first to pick up `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let storage = match non_empty("STORAGE").as_deref().map(str::trim) {
            None | Some("postgres") => StorageBackend::Postgres {
                database_url: non_empty("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            },
            Some("memory") => StorageBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORAGE",
                    reason: format!("expected 'postgres' or 'memory', got '{}'", other),
                })
            }
        };

        let max_connections = match non_empty("DB_MAX_CONNECTIONS") {
            Some(v) => v
                .trim()
                .parse::<u32>()
                .map_err(|e| ConfigError::Invalid {
                    key: "DB_MAX_CONNECTIONS",
                    reason: e.to_string(),
                })?
                .max(1),
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let defaults = LoggingConfig::default();
        let logging = LoggingConfig {
            level: non_empty("LOG_LEVEL").unwrap_or(defaults.level),
            format: non_empty("LOG_FORMAT").unwrap_or(defaults.format),
        };

        Ok(Self {
            storage,
            bind_addr: non_empty("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            max_connections,
            app_name: non_empty("APP_NAME").unwrap_or_else(|| DEFAULT_APP_NAME.to_string()),
            logging,
        })
    }
}
