//! Startup configuration
//!
//! Resolves every setting the process needs from environment variables.
//! Resolution runs once; the resulting [`StartupConfig`] is never mutated.

use crate::error::ConfigError;
use crate::mode::DeliveryMode;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::fmt;
use std::path::PathBuf;

/// Socket directory used when `DB_SOCKET_DIR` is not set
pub const DEFAULT_SOCKET_DIR: &str = "/cloudsql";

const DEFAULT_POLL_TIMEOUT_SECS: u32 = 60;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 20;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;

/// Everything resolved from the environment at process start
#[derive(Clone)]
pub struct StartupConfig {
    /// Telegram bot token
    pub bot_token: String,

    /// Webhook base URL; `None` selects polling
    pub webhook_base_url: Option<String>,

    /// Long-poll timeout for the update subscription
    pub poll_timeout_secs: u32,

    /// Database credentials and connection strategy
    pub database: DatabaseConfig,

    /// Mount the GraphQL route
    pub graphql_enabled: bool,

    /// Listener host
    pub host: String,

    /// Listener port
    pub port: u16,
}

/// Database credentials plus the strategy used to reach the server
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub user: String,
    pub password: String,
    pub name: String,
    pub target: DatabaseTarget,

    /// Maximum pooled connections (default: 20)
    pub max_connections: u32,
}

/// How the database server is reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    /// TCP connection with TLS disabled
    Direct { host: String, port: u16 },

    /// Unix socket of a managed instance, `<socket_dir>/<instance>`
    ManagedSocket { socket_dir: String, instance: String },
}

impl StartupConfig {
    /// Load configuration from the process environment
    ///
    /// `.env` is not read here; the process loads it once at startup.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        Ok(Self {
            bot_token: vars.required("TELEGRAM_BOT_TOKEN")?,
            webhook_base_url: vars.optional("TELEGRAM_BOT_WEBHOOK"),
            poll_timeout_secs: vars
                .parsed("TELEGRAM_POLL_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_POLL_TIMEOUT_SECS),
            database: DatabaseConfig::from_vars(&vars)?,
            graphql_enabled: vars.optional("ENABLE_GRAPHQL").is_some(),
            host: vars
                .optional("API_HOST")
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: vars.parsed("API_PORT")?.unwrap_or(DEFAULT_PORT),
        })
    }

    /// Delivery mode implied by the webhook base URL
    pub fn delivery_mode(&self) -> DeliveryMode {
        DeliveryMode::select(self.webhook_base_url.as_deref())
    }

    /// Address the listener binds to
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for StartupConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartupConfig")
            .field("bot_token", &"<redacted>")
            .field("webhook_base_url", &self.webhook_base_url)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("database", &self.database)
            .field("graphql_enabled", &self.graphql_enabled)
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

impl DatabaseConfig {
    fn from_vars<F>(vars: &Vars<'_, F>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let user = vars.required("POSTGRES_USER")?;
        let password = vars.required("POSTGRES_PASSWORD")?;
        let name = vars.required("POSTGRES_DATABASE")?;

        let target = match vars.optional("INSTANCE_CONNECTION_NAME") {
            Some(instance) => DatabaseTarget::ManagedSocket {
                socket_dir: vars
                    .optional("DB_SOCKET_DIR")
                    .unwrap_or_else(|| DEFAULT_SOCKET_DIR.to_string()),
                instance,
            },
            None => {
                let host = vars.required("POSTGRES_HOST")?;
                let port = vars
                    .parsed("POSTGRES_PORT")?
                    .ok_or_else(|| ConfigError::MissingEnvVar("POSTGRES_PORT".to_string()))?;
                DatabaseTarget::Direct { host, port }
            }
        };

        Ok(Self {
            user,
            password,
            name,
            target,
            max_connections: vars
                .parsed("DATABASE_MAX_CONNECTIONS")?
                .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
        })
    }

    /// Connection options for the selected strategy
    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .username(&self.user)
            .password(&self.password)
            .database(&self.name);

        match &self.target {
            DatabaseTarget::Direct { host, port } => options
                .host(host)
                .port(*port)
                .ssl_mode(PgSslMode::Disable),
            DatabaseTarget::ManagedSocket {
                socket_dir,
                instance,
            } => options.socket(PathBuf::from(socket_dir).join(instance)),
        }
    }

    /// Socket path for the managed strategy, `None` for direct connections
    pub fn socket_path(&self) -> Option<PathBuf> {
        match &self.target {
            DatabaseTarget::ManagedSocket { socket_dir, instance } => {
                Some(PathBuf::from(socket_dir).join(instance))
            }
            DatabaseTarget::Direct { .. } => None,
        }
    }

    /// Human readable description without the password
    pub fn describe(&self) -> String {
        match &self.target {
            DatabaseTarget::Direct { host, port } => {
                format!("postgres://{}@{}:{}/{}", self.user, host, port, self.name)
            }
            DatabaseTarget::ManagedSocket {
                socket_dir,
                instance,
            } => format!(
                "postgres://{}@{}/{}/{} (unix socket)",
                self.user, socket_dir, instance, self.name
            ),
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Typed access to a key lookup
struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-empty value, whitespace trimmed
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        self.optional(key)
            .map(|value| {
                value.parse().map_err(|_| ConfigError::InvalidValue {
                    name: key.to_string(),
                    value,
                })
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use std::env;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const DIRECT: &[(&str, &str)] = &[
        ("TELEGRAM_BOT_TOKEN", "test_token"),
        ("POSTGRES_USER", "bot"),
        ("POSTGRES_PASSWORD", "secret"),
        ("POSTGRES_DATABASE", "chatgate"),
        ("POSTGRES_HOST", "localhost"),
        ("POSTGRES_PORT", "5432"),
    ];

    fn with(extra: &[(&'static str, &'static str)]) -> Vec<(&'static str, &'static str)> {
        let mut pairs = DIRECT.to_vec();
        pairs.extend_from_slice(extra);
        pairs
    }

    #[test]
    fn test_direct_config_with_defaults() {
        let config = StartupConfig::from_lookup(lookup(DIRECT)).unwrap();

        assert_eq!(config.bot_token, "test_token");
        assert_eq!(config.webhook_base_url, None);
        assert_eq!(config.poll_timeout_secs, 60);
        assert!(!config.graphql_enabled);
        assert_eq!(config.listen_addr(), "0.0.0.0:8000");
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(
            config.database.target,
            DatabaseTarget::Direct {
                host: "localhost".into(),
                port: 5432
            }
        );
        assert_eq!(config.delivery_mode(), DeliveryMode::Polling);
    }

    #[test]
    fn test_webhook_url_selects_webhook_mode() {
        let config =
            StartupConfig::from_lookup(lookup(&with(&[("TELEGRAM_BOT_WEBHOOK", "https://example.com")])))
                .unwrap();

        assert_eq!(config.webhook_base_url.as_deref(), Some("https://example.com"));
        assert!(matches!(config.delivery_mode(), DeliveryMode::Webhook { .. }));
    }

    #[test]
    fn test_blank_webhook_url_means_polling() {
        let config =
            StartupConfig::from_lookup(lookup(&with(&[("TELEGRAM_BOT_WEBHOOK", "   ")]))).unwrap();

        assert_eq!(config.webhook_base_url, None);
        assert_eq!(config.delivery_mode(), DeliveryMode::Polling);
    }

    #[test]
    fn test_graphql_flag_any_non_empty_value() {
        let on = StartupConfig::from_lookup(lookup(&with(&[("ENABLE_GRAPHQL", "no")]))).unwrap();
        let off = StartupConfig::from_lookup(lookup(&with(&[("ENABLE_GRAPHQL", "")]))).unwrap();

        assert!(on.graphql_enabled);
        assert!(!off.graphql_enabled);
    }

    #[test]
    fn test_missing_required_vars() {
        let result = StartupConfig::from_lookup(lookup(&[("TELEGRAM_BOT_TOKEN", "t")]));
        assert_eq!(
            result.unwrap_err(),
            ConfigError::MissingEnvVar("POSTGRES_USER".into())
        );

        let result = StartupConfig::from_lookup(lookup(&DIRECT[1..]));
        assert_eq!(
            result.unwrap_err(),
            ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN".into())
        );
    }

    #[test]
    fn test_direct_strategy_requires_host_and_port() {
        let pairs: Vec<_> = DIRECT
            .iter()
            .copied()
            .filter(|(k, _)| *k != "POSTGRES_PORT")
            .collect();

        let result = StartupConfig::from_lookup(lookup(&pairs));
        assert_eq!(
            result.unwrap_err(),
            ConfigError::MissingEnvVar("POSTGRES_PORT".into())
        );
    }

    #[test]
    fn test_invalid_port() {
        let result = StartupConfig::from_lookup(lookup(&with(&[("API_PORT", "invalid")])));

        assert_eq!(
            result.unwrap_err(),
            ConfigError::InvalidValue {
                name: "API_PORT".into(),
                value: "invalid".into()
            }
        );
    }

    #[test]
    fn test_managed_socket_strategy() {
        let pairs = [
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("POSTGRES_USER", "bot"),
            ("POSTGRES_PASSWORD", "secret"),
            ("POSTGRES_DATABASE", "chatgate"),
            ("INSTANCE_CONNECTION_NAME", "project:region:instance"),
        ];

        let config = StartupConfig::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(
            config.database.socket_path(),
            Some(PathBuf::from("/cloudsql/project:region:instance"))
        );
        assert!(config.database.describe().contains("unix socket"));
    }

    #[test]
    fn test_socket_dir_override() {
        let pairs = [
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("POSTGRES_USER", "bot"),
            ("POSTGRES_PASSWORD", "secret"),
            ("POSTGRES_DATABASE", "chatgate"),
            ("INSTANCE_CONNECTION_NAME", "inst"),
            ("DB_SOCKET_DIR", "/tmp/sockets"),
        ];

        let config = StartupConfig::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(
            config.database.socket_path(),
            Some(PathBuf::from("/tmp/sockets/inst"))
        );
    }

    #[test]
    fn test_password_never_rendered() {
        let config = StartupConfig::from_lookup(lookup(DIRECT)).unwrap();

        assert_eq!(
            config.database.describe(),
            "postgres://bot@localhost:5432/chatgate"
        );
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(!debug.contains("test_token"));
    }

    #[test]
    #[serial]
    fn test_startup_config_from_env() {
        unsafe {
            for (k, v) in DIRECT {
                env::set_var(k, v);
            }
            env::set_var("TELEGRAM_BOT_WEBHOOK", "https://bot.example.org/");
        }

        let config = StartupConfig::from_env();
        assert!(config.is_ok());
        let config = config.unwrap();
        assert_eq!(
            config.webhook_base_url.as_deref(),
            Some("https://bot.example.org/")
        );

        // Clean up
        unsafe {
            for (k, _) in DIRECT {
                env::remove_var(k);
            }
            env::remove_var("TELEGRAM_BOT_WEBHOOK");
        }
    }

    #[test]
    #[serial]
    fn test_from_env_does_not_read_dotenv_file() {
        let dir = env::temp_dir().join(format!("chatgate-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(".env"), "TELEGRAM_BOT_TOKEN=from_dotenv\n").unwrap();
        let previous_dir = env::current_dir().unwrap();

        unsafe {
            for (k, v) in DIRECT {
                if *k != "TELEGRAM_BOT_TOKEN" {
                    env::set_var(k, v);
                }
            }
            env::remove_var("TELEGRAM_BOT_TOKEN");
        }
        env::set_current_dir(&dir).unwrap();

        let result = StartupConfig::from_env();

        env::set_current_dir(previous_dir).unwrap();
        unsafe {
            for (k, _) in DIRECT {
                env::remove_var(k);
            }
        }
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(
            result.unwrap_err(),
            ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN".to_string())
        );
    }
}
