//! Chatgate process bootstrap
//!
//! [`run`] executes the ordered startup sequence against a [`Platform`];
//! [`TelegramPlatform`] is the production one.

pub mod platform;
pub mod startup;

pub use platform::TelegramPlatform;
pub use startup::{Platform, run};
