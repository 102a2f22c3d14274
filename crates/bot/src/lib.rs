//! Chatgate Bot - Telegram update ingestion
//!
//! This crate receives Telegram updates, by long polling or by webhook, and
//! fans them out to concurrent update handlers.

pub mod client;
pub mod db;
pub mod dispatcher;
pub mod handlers;
pub mod update;

pub use client::{BotClient, TelegramClient, UpdateStream};
pub use dispatcher::{Delivery, UpdateDispatcher};
pub use handlers::{HandlerContext, MessageRecorder, UpdateHandler};
pub use update::{InboundMessage, InboundUpdate};
