//! Update handlers
//!
//! Handlers receive one message each and may run concurrently with any
//! number of other invocations. Everything they share lives in
//! [`HandlerContext`], which only holds handles that are safe to share.

use crate::db::BotDb;
use crate::update::InboundMessage;
use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use teloxide::Bot;

/// Shared, read-only collaborators for every handler invocation
#[derive(Clone)]
pub struct HandlerContext {
    pub db: BotDb,
    pub bot: Bot,
}

impl HandlerContext {
    pub fn new(pool: PgPool, bot: Bot) -> Self {
        Self {
            db: BotDb::new(pool),
            bot,
        }
    }
}

/// Per-message handling logic, shared by both delivery modes
///
/// Errors are logged by the dispatcher and otherwise dropped.
#[async_trait]
pub trait UpdateHandler: Send + Sync + 'static {
    async fn handle(&self, ctx: &HandlerContext, message: InboundMessage) -> Result<()>;
}

/// Stores every received message
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageRecorder;

#[async_trait]
impl UpdateHandler for MessageRecorder {
    async fn handle(&self, ctx: &HandlerContext, message: InboundMessage) -> Result<()> {
        let stored = ctx.db.record_message(&message).await?;

        if stored {
            tracing::debug!(
                chat_id = message.chat.id,
                message_id = message.message_id,
                "Message recorded"
            );
        } else {
            tracing::debug!(
                chat_id = message.chat.id,
                message_id = message.message_id,
                "Message already recorded, skipping"
            );
        }

        Ok(())
    }
}
