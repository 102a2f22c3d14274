//! Telegram client
//!
//! The dispatcher only needs three things from the platform: a bot handle for
//! replies, webhook registration and a polling subscription. [`BotClient`]
//! is that seam; [`TelegramClient`] implements it on top of teloxide.

use crate::update::InboundUpdate;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use teloxide::prelude::*;
use tokio::sync::mpsc;
use url::Url;

/// Buffered updates between the poller and the consumer
const UPDATE_BUFFER: usize = 100;

/// HTTP timeout headroom over the long-poll timeout
const CLIENT_TIMEOUT_MARGIN_SECS: u64 = 10;

/// Delay before retrying a failed `getUpdates`
const RETRY_DELAY: Duration = Duration::from_secs(3);

/// Lazy, unbounded sequence of updates; ends when the subscription stops
pub type UpdateStream = mpsc::Receiver<InboundUpdate>;

/// Chat platform operations used by the dispatcher
#[async_trait]
pub trait BotClient: Send + Sync + 'static {
    /// Bot handle passed to update handlers
    fn bot(&self) -> Bot;

    /// Tell the platform to push updates to `url`
    async fn register_webhook(&self, url: Url) -> Result<()>;

    /// Open the long-polling subscription
    async fn subscribe_updates(&self, poll_timeout_secs: u32) -> UpdateStream;
}

/// Authenticated teloxide-backed client
#[derive(Clone)]
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    /// Authenticate with the bot token
    ///
    /// Issues `getMe`; an invalid token fails here.
    pub async fn authenticate(token: &str, poll_timeout_secs: u32) -> Result<Self> {
        let http = teloxide::net::default_reqwest_settings()
            .timeout(Duration::from_secs(
                u64::from(poll_timeout_secs) + CLIENT_TIMEOUT_MARGIN_SECS,
            ))
            .build()
            .context("failed to build Telegram HTTP client")?;

        let client = Self::with_bot(Bot::with_client(token, http));
        let me = client.bot.get_me().await.context("getMe request failed")?;
        let username = me.user.username.as_deref().unwrap_or_default();

        tracing::info!(user = %username, "✓ Authentication with Telegram completed");

        Ok(client)
    }

    /// Wrap an already configured bot without contacting the platform
    pub fn with_bot(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl BotClient for TelegramClient {
    fn bot(&self) -> Bot {
        self.bot.clone()
    }

    async fn register_webhook(&self, url: Url) -> Result<()> {
        self.bot
            .set_webhook(url)
            .await
            .context("setWebhook request failed")?;
        Ok(())
    }

    async fn subscribe_updates(&self, poll_timeout_secs: u32) -> UpdateStream {
        // getUpdates is refused while a webhook is registered
        if let Err(e) = self.bot.delete_webhook().await {
            tracing::warn!("Failed to remove existing webhook: {}", e);
        }

        let (tx, rx) = mpsc::channel(UPDATE_BUFFER);
        tokio::spawn(poll_updates(self.bot.clone(), poll_timeout_secs, tx));
        rx
    }
}

/// Long-poll `getUpdates` until the receiving side goes away
///
/// The receiver is only checked between polls, so a dropped receiver is
/// noticed once the in-flight request returns, up to `poll_timeout_secs`
/// later.
async fn poll_updates(bot: Bot, poll_timeout_secs: u32, tx: mpsc::Sender<InboundUpdate>) {
    let mut offset: i32 = 0;

    tracing::debug!("Polling for updates (timeout: {}s)", poll_timeout_secs);

    while !tx.is_closed() {
        let updates = match bot
            .get_updates()
            .offset(offset)
            .timeout(poll_timeout_secs)
            .await
        {
            Ok(updates) => updates,
            Err(e) => {
                tracing::warn!(
                    "Failed to get updates: {}, retrying in {}s",
                    e,
                    RETRY_DELAY.as_secs()
                );
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };

        for update in &updates {
            let Some(next) = next_offset(update.id.0) else {
                tracing::error!(
                    "Update id {} is outside the getUpdates offset range, stopping subscription",
                    update.id.0
                );
                return;
            };
            offset = next;

            if tx.send(InboundUpdate::from_platform(update)).await.is_err() {
                break;
            }
        }
    }

    tracing::debug!("Update subscription closed");
}

/// Offset acknowledging `update_id`; `None` once it no longer fits
fn next_offset(update_id: u32) -> Option<i32> {
    i32::try_from(update_id).ok()?.checked_add(1)
}
