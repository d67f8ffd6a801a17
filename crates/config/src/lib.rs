use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// `AppConfig` holds all configuration parameters required by the application.
///
/// The configuration is loaded from environment variables (optionally via a
/// `.env` file) or falls back to defaults. Fields cover the database, the
/// HTTP server, authentication and the upload limits. The struct is
/// deserializable via Serde.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AppConfig {
    // --- Database settings ---
    /// Database hostname or service name (e.g. "postgres" in Docker Compose,
    /// "localhost" for local runs).
    pub db_host: String,
    /// Database port (default: 5432).
    pub db_port: u16,
    /// Database user.
    pub db_user: String,
    /// Database password.
    pub db_password: String,
    /// Database name.
    pub db_name: String,

    // --- HTTP server ---
    /// The port on which the HTTP server will listen.
    pub http_port: u16,

    // --- Shutdown timeout ---
    /// Graceful shutdown timeout (human-friendly format, e.g. "5s", "1m").
    #[serde(deserialize_with = "deserialize_duration")]
    pub shutdown_timeout: Duration,

    // --- Authentication ---
    /// Secret used to sign and verify session tokens (HS256).
    pub jwt_secret: String,
    /// Session token lifetime (human-friendly format, e.g. "24h").
    #[serde(deserialize_with = "deserialize_duration")]
    pub auth_token_ttl: Duration,
    /// Whether session cookies carry the `Secure` attribute. Off for local
    /// development over plain HTTP.
    pub secure_cookies: bool,

    // --- Uploads ---
    /// Ceiling for uploaded spreadsheet size, in bytes.
    pub max_upload_bytes: usize,
}

/// Custom deserializer for duration fields.
/// Accepts human-readable formats like "5s", "1m", "24h".
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let val = String::deserialize(deserializer)?;
    humantime::parse_duration(&val)
        .map_err(|e| D::Error::custom(format!("Invalid duration '{val}': {e}")))
}

impl AppConfig {
    /// Loads configuration from environment variables (and optionally from a
    /// `.env` file).
    ///
    /// Fields not set via env fall back to the defaults below.
    ///
    /// # Errors
    /// Returns an error if environment variables are invalid or missing
    /// required values.
    pub fn load() -> Result<Self> {
        // Load from .env file (for Docker environment)
        dotenvy::dotenv().ok();

        // Note: these defaults target local development. Deployments are
        // expected to override at least jwt_secret and the database settings.
        let settings = config::Config::builder()
            // Database
            .set_default("db_host", "localhost")?
            .set_default("db_port", 5432)?
            .set_default("db_user", "shipping_user")?
            .set_default("db_password", "securepassword")?
            .set_default("db_name", "shipping_db")?
            // HTTP
            .set_default("http_port", 8081)?
            // Shutdown
            .set_default("shutdown_timeout", "5s")?
            // Authentication
            .set_default("jwt_secret", "dev-only-insecure-secret")?
            .set_default("auth_token_ttl", "24h")?
            .set_default("secure_cookies", false)?
            // Uploads (2 MiB)
            .set_default("max_upload_bytes", 2 * 1024 * 1024)?
            .add_source(config::Environment::default().separator("_"))
            .build()?;

        settings
            .try_deserialize()
            .context("Failed to load configuration")
    }

    /// Postgres DSN assembled from the individual settings.
    pub fn db_dsn(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={} sslmode=disable",
            self.db_host, self.db_port, self.db_user, self.db_password, self.db_name
        )
    }
}
