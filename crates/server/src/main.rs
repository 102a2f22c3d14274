use anyhow::Result;
use bot::MessageRecorder;
use chatgate_core::StartupConfig;
use chatgate_shared::bootstrap;
use server::TelegramPlatform;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_env();

    // The guard must be kept alive for the duration of the program to ensure logs are flushed
    let _guard = bootstrap::init_tracing("chatgate");

    tracing::info!("🚀 Starting chatgate");

    let config = StartupConfig::from_env()?;
    tracing::info!("✓ Configuration loaded");

    server::run(&TelegramPlatform, config, Arc::new(MessageRecorder)).await?;

    tracing::info!("✓ Listener stopped gracefully");
    Ok(())
}
