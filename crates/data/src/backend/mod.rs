//! Storage backends.
//!
//! A [`Backend`] owns committed state. It serves point reads and table scans,
//! and applies a [`PendingBatch`] atomically: the relationship resolver runs
//! inside the backend's critical section, and either every resulting write
//! and delete lands or none does.

use core::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use bugstore_core::{EntityKey, EntityKind, Record};

use crate::batch::PendingBatch;
use crate::error::StoreError;
use crate::resolver::CommitSummary;

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::MemoryBackend;
#[cfg(feature = "postgres")]
pub use postgres::PostgresBackend;

/// Which backend a [`Database`](crate::Database) runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Process-local tables, lost on exit.
    #[default]
    Memory,
    /// `PostgreSQL` via sqlx.
    Postgres,
}

impl BackendKind {
    /// Lowercase name of this backend.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres => "postgres",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" | "inmemory" => Ok(Self::Memory),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            other => Err(format!("unknown backend '{other}' (expected memory or postgres)")),
        }
    }
}

/// Committed-state storage.
#[async_trait]
pub trait Backend: Send + Sync + fmt::Debug {
    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Load one committed entity.
    async fn fetch(&self, key: EntityKey) -> Result<Option<Record>, StoreError>;

    /// Load every committed entity of one kind, ordered by id.
    async fn scan(&self, kind: EntityKind) -> Result<Vec<Record>, StoreError>;

    /// Resolve and apply a batch atomically.
    ///
    /// # Errors
    ///
    /// Any resolver error, or a backend failure. On error nothing is applied.
    async fn commit(&self, batch: &PendingBatch) -> Result<CommitSummary, StoreError>;

    /// Bring the backend's schema up to date.
    async fn migrate(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
