//! Integration tests for BugStore.
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory backend only
//! cargo test -p bugstore-integration-tests
//!
//! # Also against PostgreSQL
//! TEST_DATABASE_URL=postgres://localhost/bugstore_test \
//!     cargo test -p bugstore-integration-tests -- --include-ignored
//! ```
//!
//! Every scenario in [`contract`] takes a [`Database`] and runs unchanged
//! against both backends. Scenarios create fresh ids (and slugs) so they can
//! share one `PostgreSQL` database and run in parallel.

#![cfg_attr(not(test), forbid(unsafe_code))]

use bugstore_data::Database;

pub mod contract;
pub mod fixtures;

/// Fresh, isolated in-memory database.
#[must_use]
pub fn memory_database() -> Database {
    Database::in_memory()
}

/// Migrated `PostgreSQL` database from `TEST_DATABASE_URL`.
///
/// # Panics
///
/// Panics if `TEST_DATABASE_URL` is unset or the database is unreachable.
pub async fn postgres_database() -> Database {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let config = bugstore_data::StoreConfig::postgres(url);
    let database = Database::open(&config)
        .await
        .expect("Failed to connect to test database");
    database.migrate().await.expect("Failed to run migrations");
    database
}
