//! Subcommand implementations.

use thiserror::Error;
use tracing::info;

use bugstore_data::{ConfigError, Database, StoreConfig, StoreError};

pub mod migrate;
pub mod seed;
pub mod stats;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid seed file {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Open the database described by the environment.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the backend cannot be
/// reached.
pub async fn open_database() -> Result<Database, CommandError> {
    let config = StoreConfig::from_env()?;
    info!(backend = %config.backend.kind(), "opening database");
    Ok(Database::open(&config).await?)
}
