//! Error types for leaderboard-slack

use thiserror::Error;

/// Errors raised while setting up the Slack client.
///
/// Per-call failures are reported as
/// [`PlatformError`](leaderboard_core::PlatformError) instead.
#[derive(Error, Debug)]
pub enum SlackError {
    #[error("SLACK_BOT_TOKEN is not set")]
    MissingToken,

    #[error("invalid Slack configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, SlackError>;
