//! BugStore CLI - Database migrations, seeding and statistics.
//!
//! # Usage
//!
//! ```bash
//! # Create or upgrade the PostgreSQL schema
//! bugstore migrate
//!
//! # Load customers, products, orders and order lines from YAML in one commit
//! bugstore seed crates/cli/seed/sample.yaml
//!
//! # Count committed rows per entity kind
//! bugstore stats
//! ```
//!
//! # Configuration
//!
//! The backend is chosen by `BUGSTORE_BACKEND` (see `bugstore_data::config`).
//! With the default in-memory backend, `seed` and `stats` operate on a
//! throwaway database and only validate input.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

mod commands;

#[derive(Parser)]
#[command(name = "bugstore")]
#[command(author, version, about = "BugStore CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Load entities from a YAML file and commit them as one batch
    Seed {
        /// Path to the seed file
        file: PathBuf,
    },
    /// Show row counts per entity kind
    Stats,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bugstore_cli=info,bugstore_data=info")),
        )
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    let database = commands::open_database().await?;
    match cli.command {
        Commands::Migrate => commands::migrate::run(&database).await?,
        Commands::Seed { file } => {
            commands::seed::run(&database, &file).await?;
        }
        Commands::Stats => {
            commands::stats::run(&database).await?;
        }
    }
    Ok(())
}
