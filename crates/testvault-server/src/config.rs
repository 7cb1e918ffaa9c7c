//! Server configuration loaded from environment variables.

use std::env;
use std::time::Duration;

use crate::service::RetryPolicy;

/// Configuration error.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("Invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Where artifacts are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    /// Process-local; contents are lost on restart.
    Memory,
}

/// Which test generation backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    Fallback,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL (required for the postgres backend)
    pub database_url: Option<String>,

    /// Server bind address (host:port)
    pub bind_address: String,

    /// Default log filter when RUST_LOG is unset
    pub log_level: String,

    /// Secret for verifying HS256 session tokens
    pub jwt_secret: String,

    pub storage_backend: StorageBackend,

    /// Maximum pooled database connections
    pub db_max_connections: u32,

    /// Attempts for read operations when storage is unavailable
    pub storage_retry_attempts: u32,

    /// Initial backoff between read retries
    pub storage_retry_base_delay: Duration,

    pub generator: GeneratorKind,

    /// Accept cross-origin requests from any localhost port
    pub cors_allow_localhost: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage_backend = match lookup("STORAGE_BACKEND").as_deref() {
            None | Some("postgres") => StorageBackend::Postgres,
            Some("memory") => StorageBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let generator = match lookup("GENERATOR").map(|g| g.to_lowercase()).as_deref() {
            None | Some("fallback") | Some("none") => GeneratorKind::Fallback,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "GENERATOR",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            database_url,
            bind_address: lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8080".into()),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            jwt_secret: lookup("JWT_SECRET")
                .filter(|s| !s.is_empty())
                .ok_or(ConfigError::Missing("JWT_SECRET"))?,
            storage_backend,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            storage_retry_attempts: parse_or(&lookup, "STORAGE_RETRY_ATTEMPTS", 3)?,
            storage_retry_base_delay: Duration::from_millis(parse_or(
                &lookup,
                "STORAGE_RETRY_BASE_DELAY_MS",
                50,
            )?),
            generator,
            cors_allow_localhost: parse_or(&lookup, "CORS_ALLOW_ANY_LOCALHOST", true)?,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.storage_retry_attempts, self.storage_retry_base_delay)
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
