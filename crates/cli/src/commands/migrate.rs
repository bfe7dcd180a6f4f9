//! Database migration command.
//!
//! Runs the server crate's embedded migrations against the storefront
//! database.
//!
//! # Usage
//!
//! ```bash
//! gilded-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `GILDED_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`)

use tracing::info;

use super::{CommandError, connect};

/// Run pending migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    info!("Connecting to storefront database...");
    let pool = connect().await?;

    info!("Running migrations...");
    gilded_server::db::MIGRATOR.run(&pool).await?;

    info!("Migrations complete");
    Ok(())
}
