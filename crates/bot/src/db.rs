//! Database operations for the bot
//!
//! Handles the queries needed by update handlers

use crate::update::InboundMessage;
use sqlx::PgPool;

/// Bot database handle
#[derive(Clone)]
pub struct BotDb {
    pool: PgPool,
}

impl BotDb {
    /// Create a new database handle
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store a received message
    ///
    /// Returns `false` when the message was already stored.
    pub async fn record_message(&self, message: &InboundMessage) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO telegram_messages
                (chat_id, message_id, sender_id, sender_username, text, sent_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (chat_id, message_id) DO NOTHING
            "#,
        )
        .bind(message.chat.id)
        .bind(message.message_id)
        .bind(message.from.as_ref().map(|sender| sender.id))
        .bind(message.from.as_ref().and_then(|sender| sender.username.as_deref()))
        .bind(message.text.as_deref())
        .bind(message.sent_at())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
