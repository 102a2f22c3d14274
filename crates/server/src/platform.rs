//! Production platform: Postgres, Telegram and a TCP listener

use crate::startup::Platform;
use api::QueryEngine;
use async_trait::async_trait;
use axum::Router;
use bot::TelegramClient;
use chatgate_core::{DatabaseConfig, StartupError};
use sqlx::PgPool;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default, Clone, Copy)]
pub struct TelegramPlatform;

#[async_trait]
impl Platform for TelegramPlatform {
    type Client = TelegramClient;

    async fn open_database(&self, config: &DatabaseConfig) -> Result<PgPool, StartupError> {
        chatgate_shared::bootstrap::open_database(config).await
    }

    async fn ping_database(&self, pool: &PgPool) -> Result<(), StartupError> {
        chatgate_shared::bootstrap::ping_database(pool).await
    }

    async fn migrate_database(&self, pool: &PgPool) -> Result<(), StartupError> {
        sqlx::migrate!("../../migrations")
            .run(pool)
            .await
            .map_err(|e| StartupError::Migration(e.to_string()))?;

        tracing::info!("✓ Migrations completed");
        Ok(())
    }

    async fn authenticate(
        &self,
        token: &str,
        poll_timeout_secs: u32,
    ) -> Result<TelegramClient, StartupError> {
        TelegramClient::authenticate(token, poll_timeout_secs)
            .await
            .map_err(|e| StartupError::BotAuthentication(format!("{e:#}")))
    }

    async fn build_query_engine(&self, pool: &PgPool) -> Result<QueryEngine, StartupError> {
        QueryEngine::connect(pool.clone()).await
    }

    async fn serve(
        &self,
        addr: &str,
        router: Router,
        consumer: Option<JoinHandle<()>>,
    ) -> Result<(), StartupError> {
        let shutdown = CancellationToken::new();

        let signal_token = shutdown.clone();
        tokio::spawn(async move {
            wait_for_shutdown().await;
            tracing::info!("📡 Shutdown signal received");
            signal_token.cancel();
        });

        let result = api::run_api(router, addr, shutdown).await;

        if let Some(consumer) = consumer {
            consumer.abort();
            tracing::info!("Polling consumer stopped");
        }

        result
    }
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
