//! Chatgate Core - configuration and startup domain types
//!
//! This crate contains no I/O beyond reading the process environment.
//! Startup configuration, delivery mode selection and the startup error
//! taxonomy are defined here.

pub mod config;
pub mod error;
pub mod mode;

pub use config::{DatabaseConfig, DatabaseTarget, StartupConfig};
pub use error::{ConfigError, StartupError};
pub use mode::{DeliveryMode, WEBHOOK_PATH, webhook_target};
