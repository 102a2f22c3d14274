//! Error types for configuration and startup

use thiserror::Error;

/// Configuration resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: String, value: String },
}

/// Startup-fatal errors
///
/// Every variant aborts the process before the listener serves traffic.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("failed to resolve configuration")]
    Config(#[from] ConfigError),

    #[error("failed to connect to the database")]
    DatabaseConnect(#[source] sqlx::Error),

    #[error("failed to ping the database")]
    DatabasePing(#[source] sqlx::Error),

    #[error("failed to apply database migrations: {0}")]
    Migration(String),

    #[error("failed to authenticate with Telegram: {0}")]
    BotAuthentication(String),

    #[error("failed to register webhook {url}: {reason}")]
    WebhookRegistration { url: String, reason: String },

    #[error("failed to construct query engine: {0}")]
    QueryEngine(String),

    #[error("failed to start server on {addr}")]
    Listener {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}
