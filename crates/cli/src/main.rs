//! Gilded CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! gilded-cli migrate
//!
//! # Seed the catalog with sample data
//! gilded-cli seed
//!
//! # Seed, wiping existing catalog and demo profile first
//! gilded-cli seed --fresh
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Seed the database with a sample catalog and a demo shopper

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "gilded-cli")]
#[command(author, version, about = "Gilded CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the database with a sample catalog and a demo shopper
    Seed {
        /// Delete the existing catalog and demo profile first
        #[arg(long)]
        fresh: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gilded_cli=info,gilded_server=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Migrate => commands::migrate::run().await,
        Commands::Seed { fresh } => commands::seed::run(fresh).await,
    };

    if let Err(e) = result {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}
