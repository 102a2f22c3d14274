use chatgate_core::{DatabaseConfig, StartupError};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize dotenvy
pub fn init_env() {
    dotenvy::dotenv().ok();
}

/// Default log filter for a service
pub fn default_filter(service_name: &str) -> String {
    format!("info,{service_name}=debug,bot=debug,api=debug,server=debug,sqlx=warn")
}

/// Whether `ENABLE_FILE_LOGGING` allows the JSON file layer
fn file_logging_enabled(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.to_lowercase() != "false" && v != "0")
}

/// Initialize tracing with optional file logging
///
/// The returned guard must be kept alive for the duration of the program to
/// ensure logs are flushed.
pub fn init_tracing(service_name: &str) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter(service_name).into());

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true));

    let enable_file_logging =
        file_logging_enabled(std::env::var("ENABLE_FILE_LOGGING").ok().as_deref());

    if enable_file_logging {
        // If LOG_DIR is set, use it. Default to "logs"
        let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());
        let file_appender =
            tracing_appender::rolling::daily(log_dir, format!("{service_name}.log"));
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(non_blocking)
                    .json(),
            )
            .init();

        Some(guard)
    } else {
        registry.init();
        None
    }
}

/// Open the database pool
///
/// Connects eagerly so an unreachable server fails here rather than on first use.
pub async fn open_database(config: &DatabaseConfig) -> Result<PgPool, StartupError> {
    tracing::info!("Connecting to {}", config.describe());

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(10))
        .idle_timeout(std::time::Duration::from_secs(300))
        .max_lifetime(std::time::Duration::from_secs(1800)) // 30 minutes
        .connect_with(config.connect_options())
        .await
        .map_err(StartupError::DatabaseConnect)?;

    tracing::info!(
        "✓ Database pool established (max_connections: {})",
        config.max_connections
    );

    Ok(pool)
}

/// Health-check the database with a trivial query
pub async fn ping_database(pool: &PgPool) -> Result<(), StartupError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(StartupError::DatabasePing)?;

    tracing::info!("✓ Database ping succeeded");
    Ok(())
}
