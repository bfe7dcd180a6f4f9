//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `GILDED_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`)
//! - `GILDED_BASE_URL` - Public URL for the storefront
//! - `MIDTRANS_SERVER_KEY` - Payment gateway server key
//! - `MIDTRANS_CLIENT_KEY` - Payment gateway client key (safe for browsers)
//! - `SMTP_HOST`, `SMTP_USERNAME`, `SMTP_PASSWORD` - Email delivery
//!
//! ## Optional
//! - `GILDED_HOST` - Bind address (default: 127.0.0.1)
//! - `GILDED_PORT` - Listen port (default: 3000)
//! - `MIDTRANS_SNAP_BASE_URL` - Snap API base (default: sandbox)
//! - `MIDTRANS_API_BASE_URL` - Core API base (default: sandbox)
//! - `SMTP_PORT` - SMTP port (default: 587)
//! - `EMAIL_FROM_ADDRESS` - From header (default: Gilded <orders@gilded.example>)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example-key",
    "xxx",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront service configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Payment gateway configuration
    pub midtrans: MidtransConfig,
    /// Transactional email configuration
    pub email: EmailConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Payment gateway (Midtrans) configuration.
///
/// Implements `Debug` manually to redact the server key.
#[derive(Clone)]
pub struct MidtransConfig {
    /// Server key used for Basic auth against the gateway APIs
    pub server_key: SecretString,
    /// Client key embedded in the payment page
    pub client_key: String,
    /// Snap API base URL (payment session creation)
    pub snap_base_url: String,
    /// Core API base URL (refunds)
    pub api_base_url: String,
}

impl std::fmt::Debug for MidtransConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidtransConfig")
            .field("server_key", &"[REDACTED]")
            .field("client_key", &self.client_key)
            .field("snap_base_url", &self.snap_base_url)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

/// SMTP email configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP relay host
    pub smtp_host: String,
    /// SMTP port
    pub smtp_port: u16,
    /// SMTP username
    pub smtp_username: String,
    /// SMTP password
    pub smtp_password: SecretString,
    /// From address for outgoing mail
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets look like placeholders.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("GILDED_DATABASE_URL")?;
        let host = get_env_or_default("GILDED_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("GILDED_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("GILDED_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("GILDED_PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("GILDED_BASE_URL")?;

        let midtrans = MidtransConfig::from_env()?;
        let email = EmailConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            midtrans,
            email,
            sentry_dsn,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl MidtransConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server_key: get_validated_secret("MIDTRANS_SERVER_KEY")?,
            client_key: get_required_env("MIDTRANS_CLIENT_KEY")?,
            snap_base_url: get_env_or_default(
                "MIDTRANS_SNAP_BASE_URL",
                "https://app.sandbox.midtrans.com",
            ),
            api_base_url: get_env_or_default(
                "MIDTRANS_API_BASE_URL",
                "https://api.sandbox.midtrans.com",
            ),
        })
    }
}

impl EmailConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            smtp_host: get_required_env("SMTP_HOST")?,
            smtp_port: get_env_or_default("SMTP_PORT", "587")
                .parse::<u16>()
                .map_err(|e| ConfigError::InvalidEnvVar("SMTP_PORT".to_string(), e.to_string()))?,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: get_validated_secret("SMTP_PASSWORD")?,
            from_address: get_env_or_default("EMAIL_FROM_ADDRESS", "Gilded <orders@gilded.example>"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Validate that a secret is not an obvious placeholder.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
