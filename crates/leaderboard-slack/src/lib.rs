//! Slack adapter for the support leaderboard
//!
//! Provides [`SlackClient`], a [`ChatPlatform`](leaderboard_core::ChatPlatform)
//! backed by the Slack Web API.

mod client;
mod config;
mod error;
mod wire;

pub use client::SlackClient;
pub use config::{SlackConfig, DEFAULT_API_BASE, DEFAULT_REQUEST_TIMEOUT_MS};
pub use error::{Result, SlackError};
