//! Row count statistics.

use tracing::info;

use bugstore_core::{Customer, Order, OrderLine, Product};
use bugstore_data::{Database, Store, StoreError};

/// Committed row counts per entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    pub customers: usize,
    pub products: usize,
    pub orders: usize,
    pub order_lines: usize,
}

impl Stats {
    /// Count every kind through `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if a backend read fails.
    pub async fn collect(store: &Store) -> Result<Self, StoreError> {
        Ok(Self {
            customers: store.list::<Customer>().await?.len(),
            products: store.list::<Product>().await?.len(),
            orders: store.list::<Order>().await?.len(),
            order_lines: store.list::<OrderLine>().await?.len(),
        })
    }
}

/// Log row counts per entity kind.
///
/// # Errors
///
/// Returns an error if a backend read fails.
pub async fn run(database: &Database) -> Result<(), StoreError> {
    let stats = Stats::collect(&database.store()).await?;

    info!(
        backend = %database.backend_kind(),
        customers = stats.customers,
        products = stats.products,
        orders = stats.orders,
        order_lines = stats.order_lines,
        "row counts"
    );
    Ok(())
}
