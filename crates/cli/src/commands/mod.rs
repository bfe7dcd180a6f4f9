//! CLI subcommands.

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

pub mod migrate;
pub mod seed;

/// Errors shared by the CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// A required environment variable is missing.
    #[error("missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection or query failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failure.
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Store-level failure while seeding.
    #[error("store error: {0}")]
    Store(#[from] gilded_server::db::RepositoryError),

    /// Invalid seed data.
    #[error("invalid seed data: {0}")]
    InvalidData(String),
}

/// Connect to the storefront database from the environment.
///
/// Reads `GILDED_DATABASE_URL`, falling back to `DATABASE_URL`.
pub async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("GILDED_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("GILDED_DATABASE_URL"))?;

    Ok(gilded_server::db::create_pool(&database_url).await?)
}
