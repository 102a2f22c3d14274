//! Startup sequencer
//!
//! Steps run strictly in order: open database, ping, migrate, authenticate
//! the bot, activate the delivery mode, mount the optional GraphQL route and
//! start the listener. The first failing step short-circuits everything after
//! it; nothing is retried and nothing acquired earlier is torn down.

use api::QueryEngine;
use async_trait::async_trait;
use axum::Router;
use bot::{BotClient, HandlerContext, UpdateDispatcher, UpdateHandler};
use chatgate_core::{DatabaseConfig, StartupConfig, StartupError};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// External collaborators the sequencer drives
#[async_trait]
pub trait Platform: Send + Sync {
    type Client: BotClient;

    async fn open_database(&self, config: &DatabaseConfig) -> Result<PgPool, StartupError>;

    async fn ping_database(&self, pool: &PgPool) -> Result<(), StartupError>;

    async fn migrate_database(&self, pool: &PgPool) -> Result<(), StartupError>;

    async fn authenticate(
        &self,
        token: &str,
        poll_timeout_secs: u32,
    ) -> Result<Self::Client, StartupError>;

    async fn build_query_engine(&self, pool: &PgPool) -> Result<QueryEngine, StartupError>;

    /// Start the listener; returns once it has stopped
    ///
    /// `consumer` is the polling consumer task, if polling is active.
    async fn serve(
        &self,
        addr: &str,
        router: Router,
        consumer: Option<JoinHandle<()>>,
    ) -> Result<(), StartupError>;
}

/// Run the startup sequence, then serve until the listener stops
pub async fn run<P: Platform>(
    platform: &P,
    config: StartupConfig,
    handler: Arc<dyn UpdateHandler>,
) -> Result<(), StartupError> {
    tracing::debug!(?config, "Resolved startup configuration");

    let pool = platform.open_database(&config.database).await?;
    platform.ping_database(&pool).await?;
    platform.migrate_database(&pool).await?;

    let client = platform
        .authenticate(&config.bot_token, config.poll_timeout_secs)
        .await?;

    let ctx = HandlerContext::new(pool.clone(), client.bot());
    let mode = config.delivery_mode();
    tracing::info!(mode = mode.name(), "Selected update delivery mode");

    let delivery = UpdateDispatcher::new(handler, ctx)
        .activate(&mode, &client, config.poll_timeout_secs)
        .await?;

    tracing::info!(mode = delivery.mode_name(), "✓ Update delivery active");

    let (mut router, consumer) = delivery.mount(api::create_router(pool.clone()));

    if config.graphql_enabled {
        let engine = platform.build_query_engine(&pool).await?;
        router = api::mount_graphql(router, engine);
        tracing::info!("✓ GraphQL route mounted at {}", api::GRAPHQL_PATH);
    }

    platform.serve(&config.listen_addr(), router, consumer).await
}
