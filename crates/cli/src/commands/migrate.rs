//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! BUGSTORE_BACKEND=postgres BUGSTORE_DATABASE_URL=postgres://... bugstore migrate
//! ```
//!
//! Migrations are embedded from `crates/data/migrations/`. The in-memory
//! backend has no schema and the command is a no-op there.

use tracing::{info, warn};

use bugstore_data::{BackendKind, Database};

use super::CommandError;

/// Run pending migrations.
///
/// # Errors
///
/// Returns an error if a migration fails.
pub async fn run(database: &Database) -> Result<(), CommandError> {
    if database.backend_kind() == BackendKind::Memory {
        warn!("in-memory backend selected, nothing to migrate");
    }

    info!("Running migrations...");
    database.migrate().await?;
    info!("Migrations complete!");
    Ok(())
}
