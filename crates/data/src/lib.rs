//! BugStore Data - Persistence context for the order-management model.
//!
//! A [`Store`] is one unit of work: it accumulates a pending batch of adds,
//! updates and removes, answers reads from committed state, and applies the
//! whole batch atomically on [`Store::commit`]. Stores are obtained from a
//! [`Database`], a shared handle to one configured backend.
//!
//! # Backends
//!
//! - In-memory (always available) - copy-on-write tables behind an async lock
//! - `PostgreSQL` (feature `postgres`) - one transaction per commit
//!
//! Both implement [`Backend`] and run the same relationship resolver at
//! commit time: order removals cascade to their order lines, and order lines
//! must reference an existing order and product.
//!
//! # Example
//!
//! ```rust
//! # async fn example() -> Result<(), bugstore_data::StoreError> {
//! use bugstore_core::{Customer, CustomerId};
//! use bugstore_data::Database;
//!
//! let database = Database::in_memory();
//! let mut store = database.store();
//!
//! let id = CustomerId::new_v4();
//! store.add(Customer { id, name: "Ada".to_owned(), ..Customer::default() });
//! store.commit().await?;
//!
//! let customer = store.find_by_id::<Customer>(id).await?;
//! assert_eq!(customer.map(|c| c.name), Some("Ada".to_owned()));
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod batch;
mod cancel;
pub mod config;
pub mod database;
pub mod error;
pub mod query;
pub mod resolver;
pub mod store;

pub use backend::{Backend, BackendKind, MemoryBackend};
#[cfg(feature = "postgres")]
pub use backend::PostgresBackend;
pub use batch::{Mutation, PendingBatch};
pub use config::{BackendConfig, ConfigError, PostgresConfig, StoreConfig};
pub use database::Database;
pub use error::StoreError;
pub use query::Query;
pub use resolver::{CommitPlan, CommitSummary};
pub use store::Store;
