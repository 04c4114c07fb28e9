//! Seed the database from a YAML file.
//!
//! The file lists entities per kind; all of them are committed in one batch,
//! so a file with a dangling order line loads nothing.
//!
//! ```yaml
//! customers:
//!   - id: 6f1c...
//!     name: Ada Lovelace
//!     email: ada@example.com
//!     phone: "+44 20 7946 0000"
//!     birth_date: 1815-12-10
//! products: []
//! orders: []
//! order_lines: []
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use bugstore_core::{Customer, Order, OrderLine, Product};
use bugstore_data::{CommitSummary, Database, Store, StoreError};

use super::CommandError;

/// Entities to load, grouped by kind.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedFile {
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub order_lines: Vec<OrderLine>,
}

impl SeedFile {
    /// Parse a seed document.
    ///
    /// # Errors
    ///
    /// Returns the YAML error if the document is malformed.
    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Total number of entities in the file.
    #[must_use]
    pub fn len(&self) -> usize {
        self.customers.len() + self.products.len() + self.orders.len() + self.order_lines.len()
    }

    /// Whether the file lists nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register every entity with `store` and commit.
    ///
    /// # Errors
    ///
    /// Returns the commit error; nothing is applied in that case.
    pub async fn load(self, store: &mut Store) -> Result<CommitSummary, StoreError> {
        store.add_range(self.customers);
        store.add_range(self.products);
        store.add_range(self.orders);
        store.add_range(self.order_lines);
        store.commit().await
    }
}

/// Seed entities from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or the commit fails.
pub async fn run(database: &Database, path: &Path) -> Result<(), CommandError> {
    let shown = path.display().to_string();
    info!(path = %shown, "loading seed file");

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CommandError::Io {
            path: shown.clone(),
            source,
        })?;
    let seed = SeedFile::parse(&content).map_err(|source| CommandError::Yaml {
        path: shown.clone(),
        source,
    })?;

    info!(entities = seed.len(), "parsed seed file");

    let summary = seed.load(&mut database.store()).await?;

    info!(
        written = summary.written,
        deleted = summary.deleted,
        "seeding complete"
    );
    Ok(())
}
