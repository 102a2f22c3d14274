//! Inbound updates
//!
//! One update per platform event, decoded either from a polling response or
//! from a webhook request body. Only the fields handlers need are kept.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use teloxide::types::{Message, Update, UpdateKind};

/// A single chat event
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundUpdate {
    pub update_id: i64,

    /// Absent for edits, callbacks, channel posts and every other kind
    #[serde(default)]
    pub message: Option<InboundMessage>,
}

/// A new message in a chat
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundMessage {
    pub message_id: i64,

    /// Unix seconds
    pub date: i64,

    pub chat: ChatRef,

    #[serde(default)]
    pub from: Option<Sender>,

    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatRef {
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Sender {
    pub id: i64,

    #[serde(default)]
    pub username: Option<String>,
}

impl InboundUpdate {
    /// Convert an update received through `getUpdates`
    pub fn from_platform(update: &Update) -> Self {
        let message = match &update.kind {
            UpdateKind::Message(msg) => Some(InboundMessage::from(msg)),
            _ => None,
        };

        Self {
            update_id: i64::from(update.id.0),
            message,
        }
    }

    /// The message payload, or `None` for updates handlers never see
    pub fn into_message(self) -> Option<InboundMessage> {
        self.message
    }
}

impl From<&Message> for InboundMessage {
    fn from(msg: &Message) -> Self {
        Self {
            message_id: i64::from(msg.id.0),
            date: msg.date.timestamp(),
            chat: ChatRef { id: msg.chat.id.0 },
            from: msg.from.as_ref().and_then(|user| {
                let id = i64::try_from(user.id.0).ok()?;
                Some(Sender {
                    id,
                    username: user.username.clone(),
                })
            }),
            text: msg.text().map(str::to_owned),
        }
    }
}

impl InboundMessage {
    /// Send time; falls back to now for out-of-range timestamps
    pub fn sent_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.date, 0).unwrap_or_else(Utc::now)
    }
}
