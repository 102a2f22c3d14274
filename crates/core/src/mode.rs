//! Update delivery mode
//!
//! Exactly one mode is chosen per process, once, from the webhook base URL.

use url::Url;

/// HTTP path the platform pushes updates to in webhook mode
pub const WEBHOOK_PATH: &str = "/hook/telegram";

/// How inbound updates reach the process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Long-polling subscription consumed by a background task
    Polling,

    /// Platform pushes updates to `<base_url>/hook/telegram`
    Webhook { base_url: String },
}

impl DeliveryMode {
    /// Select the mode from the configured webhook base URL
    ///
    /// Empty or blank selects polling; anything else selects webhook.
    pub fn select(webhook_base_url: Option<&str>) -> Self {
        match webhook_base_url.map(str::trim).filter(|url| !url.is_empty()) {
            Some(base_url) => Self::Webhook {
                base_url: base_url.to_string(),
            },
            None => Self::Polling,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Polling => "polling",
            Self::Webhook { .. } => "webhook",
        }
    }
}

/// Append the webhook path to a base URL
pub fn webhook_target(base_url: &str) -> Result<Url, url::ParseError> {
    Url::parse(&format!("{}{}", base_url.trim_end_matches('/'), WEBHOOK_PATH))
}
