//! Store configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `BUGSTORE_BACKEND` - `memory` (default) or `postgres`
//! - `BUGSTORE_DB_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `BUGSTORE_DB_MIN_CONNECTIONS` - Idle connections kept open (default: 2)
//! - `BUGSTORE_DB_ACQUIRE_TIMEOUT_SECS` - Pool acquire timeout (default: 10)
//!
//! ## Required for `postgres`
//! - `BUGSTORE_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`)

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

use crate::backend::BackendKind;

const DEFAULT_MAX_CONNECTIONS: &str = "10";
const DEFAULT_MIN_CONNECTIONS: &str = "2";
const DEFAULT_ACQUIRE_TIMEOUT_SECS: &str = "10";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Store configuration.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Which backend to open and how.
    pub backend: BackendConfig,
}

/// Backend selection plus its settings.
#[derive(Debug, Clone, Default)]
pub enum BackendConfig {
    /// Fresh process-local tables.
    #[default]
    Memory,
    /// `PostgreSQL` pool settings.
    Postgres(PostgresConfig),
}

impl BackendConfig {
    /// Which backend this selects.
    #[must_use]
    pub const fn kind(&self) -> BackendKind {
        match self {
            Self::Memory => BackendKind::Memory,
            Self::Postgres(_) => BackendKind::Postgres,
        }
    }
}

/// `PostgreSQL` connection pool settings.
///
/// Implements `Debug` manually to redact the connection string.
#[derive(Clone)]
pub struct PostgresConfig {
    /// Connection string (contains password)
    pub database_url: SecretString,
    /// Maximum pool size
    pub max_connections: u32,
    /// Connections kept open when idle
    pub min_connections: u32,
    /// How long to wait for a free connection
    pub acquire_timeout: Duration,
}

impl PostgresConfig {
    /// Pool settings with defaults for everything but the URL.
    #[must_use]
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: SecretString::from(database_url.into()),
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

impl std::fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("database_url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

impl StoreConfig {
    /// In-memory backend.
    #[must_use]
    pub const fn in_memory() -> Self {
        Self {
            backend: BackendConfig::Memory,
        }
    }

    /// `PostgreSQL` backend with default pool settings.
    #[must_use]
    pub fn postgres(database_url: impl Into<String>) -> Self {
        Self {
            backend: BackendConfig::Postgres(PostgresConfig::new(database_url)),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is invalid, or if the `postgres`
    /// backend is selected without a database URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`StoreConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(&lookup);

        let kind: BackendKind = env.parse_or_default("BUGSTORE_BACKEND", "memory")?;
        let backend = match kind {
            BackendKind::Memory => BackendConfig::Memory,
            BackendKind::Postgres => BackendConfig::Postgres(PostgresConfig {
                database_url: env.database_url("BUGSTORE_DATABASE_URL")?,
                max_connections: env
                    .parse_or_default("BUGSTORE_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
                min_connections: env
                    .parse_or_default("BUGSTORE_DB_MIN_CONNECTIONS", DEFAULT_MIN_CONNECTIONS)?,
                acquire_timeout: Duration::from_secs(env.parse_or_default(
                    "BUGSTORE_DB_ACQUIRE_TIMEOUT_SECS",
                    DEFAULT_ACQUIRE_TIMEOUT_SECS,
                )?),
            }),
        };

        Ok(Self { backend })
    }
}

/// Variable source shared by the helpers below.
struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    fn get_optional_env(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn get_env_or_default(&self, key: &str, default: &str) -> String {
        self.get_optional_env(key)
            .unwrap_or_else(|| default.to_string())
    }

    fn parse_or_default<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get_env_or_default(key, default)
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }

    /// Database URL with fallback to generic `DATABASE_URL`.
    fn database_url(&self, primary_key: &str) -> Result<SecretString, ConfigError> {
        self.get_optional_env(primary_key)
            .or_else(|| self.get_optional_env("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<StoreConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StoreConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_to_memory() {
        let config = load(&[]).unwrap();
        assert!(matches!(config.backend, BackendConfig::Memory));
        assert_eq!(config.backend.kind(), BackendKind::Memory);
    }

    #[test]
    fn test_postgres_requires_url() {
        let err = load(&[("BUGSTORE_BACKEND", "postgres")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "BUGSTORE_DATABASE_URL"));
    }

    #[test]
    fn test_postgres_falls_back_to_database_url() {
        let config = load(&[
            ("BUGSTORE_BACKEND", "postgres"),
            ("DATABASE_URL", "postgres://fallback/db"),
        ])
        .unwrap();
        let BackendConfig::Postgres(pg) = config.backend else {
            panic!("expected postgres backend");
        };
        assert_eq!(pg.database_url.expose_secret(), "postgres://fallback/db");
        assert_eq!(pg.max_connections, 10);
        assert_eq!(pg.min_connections, 2);
        assert_eq!(pg.acquire_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_primary_url_wins_and_pool_settings_parse() {
        let config = load(&[
            ("BUGSTORE_BACKEND", "postgresql"),
            ("BUGSTORE_DATABASE_URL", "postgres://primary/db"),
            ("DATABASE_URL", "postgres://fallback/db"),
            ("BUGSTORE_DB_MAX_CONNECTIONS", "25"),
            ("BUGSTORE_DB_ACQUIRE_TIMEOUT_SECS", "3"),
        ])
        .unwrap();
        let BackendConfig::Postgres(pg) = config.backend else {
            panic!("expected postgres backend");
        };
        assert_eq!(pg.database_url.expose_secret(), "postgres://primary/db");
        assert_eq!(pg.max_connections, 25);
        assert_eq!(pg.acquire_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = load(&[("BUGSTORE_BACKEND", "sqlite")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref k, _) if k == "BUGSTORE_BACKEND"));

        let err = load(&[
            ("BUGSTORE_BACKEND", "postgres"),
            ("BUGSTORE_DATABASE_URL", "postgres://x/y"),
            ("BUGSTORE_DB_MAX_CONNECTIONS", "many"),
        ])
        .unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidEnvVar(ref k, _) if k == "BUGSTORE_DB_MAX_CONNECTIONS")
        );
    }

    #[test]
    fn test_debug_redacts_url() {
        let config = StoreConfig::postgres("postgres://user:hunter2@db/bugstore");
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
    }
}
