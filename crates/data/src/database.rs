//! Factory for stores.

use std::sync::Arc;

use tracing::info;

use crate::backend::{Backend, BackendKind, MemoryBackend};
use crate::config::{BackendConfig, StoreConfig};
use crate::error::StoreError;
use crate::store::Store;

/// Shared handle to one configured backend.
///
/// Clones share committed state. Each call to [`Database::store`] starts an
/// independent unit of work.
#[derive(Debug, Clone)]
pub struct Database {
    backend: Arc<dyn Backend>,
}

impl Database {
    /// Open the backend described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::BackendUnavailable` if `PostgreSQL` is requested
    /// in a build without the `postgres` feature, or a database error if the
    /// pool cannot connect.
    pub async fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let database = match &config.backend {
            BackendConfig::Memory => Self::in_memory(),
            #[cfg(feature = "postgres")]
            BackendConfig::Postgres(pg) => {
                Self::from_backend(crate::backend::PostgresBackend::connect(pg).await?)
            }
            #[cfg(not(feature = "postgres"))]
            BackendConfig::Postgres(_) => {
                return Err(StoreError::BackendUnavailable(BackendKind::Postgres.as_str()));
            }
        };
        info!(backend = %database.backend_kind(), "database opened");
        Ok(database)
    }

    /// A fresh, empty in-memory database.
    ///
    /// Every call returns isolated state.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_backend(MemoryBackend::new())
    }

    /// Wrap a backend.
    #[must_use]
    pub fn from_backend(backend: impl Backend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Start a unit of work.
    #[must_use]
    pub fn store(&self) -> Store {
        Store::new(Arc::clone(&self.backend))
    }

    /// Which backend this database runs on.
    #[must_use]
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Run pending schema migrations. A no-op for the in-memory backend.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Migration` if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        self.backend.migrate().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bugstore_core::{Customer, CustomerId};

    use super::*;

    #[tokio::test]
    async fn test_open_memory() {
        let database = Database::open(&StoreConfig::in_memory()).await.unwrap();
        assert_eq!(database.backend_kind(), BackendKind::Memory);
        database.migrate().await.unwrap();
    }

    #[cfg(not(feature = "postgres"))]
    #[tokio::test]
    async fn test_open_postgres_without_feature() {
        let err = Database::open(&StoreConfig::postgres("postgres://localhost/bugstore"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::BackendUnavailable("postgres")));
    }

    #[tokio::test]
    async fn test_clones_share_state_and_instances_are_isolated() {
        let database = Database::in_memory();
        let shared = database.clone();
        let other = Database::in_memory();

        let id = CustomerId::new_v4();
        let mut store = database.store();
        store.add(Customer {
            id,
            ..Customer::default()
        });
        store.commit().await.unwrap();

        assert!(shared.store().find_by_id::<Customer>(id).await.unwrap().is_some());
        assert!(other.store().find_by_id::<Customer>(id).await.unwrap().is_none());
    }
}
