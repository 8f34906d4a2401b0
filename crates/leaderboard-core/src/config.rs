//! Pipeline configuration.
//!
//! Built by the binary from flags and environment variables, then checked
//! with [`LeaderboardConfig::validate`] before any remote call is made.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{LeaderboardError, Result};
use crate::executor::RetryPolicy;
use crate::platform::MAX_PAGE_SIZE;

/// Reaction that marks a thread as resolved when none is configured.
pub const DEFAULT_RESOLUTION_EMOJI: &str = "white_check_mark";

/// Workflow message asserting a resolution. The `agent` group captures the
/// resolving agent's user id from a `<@U…>` mention.
pub const DEFAULT_RESOLUTION_PATTERN: &str =
    r"(?i)thread\s+(?:was\s+)?resolved\s+by\s+<@(?P<agent>[UW][A-Z0-9]+)(?:\|[^>]*)?>";

/// First URL in a workflow message; the `url` group is the thread key.
pub const DEFAULT_THREAD_URL_PATTERN: &str = r"<?(?P<url>https?://[^\s<>|]+)";

/// Number of recent output-channel entries the duplicate guard inspects.
pub const DEFAULT_HISTORY_SCAN_LIMIT: u32 = 100;

/// Which bot identities the workflow strategy accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "bot_id", rename_all = "snake_case")]
pub enum WorkflowTrust {
    /// Any bot-authored message may carry a resolution.
    AnyBot,
    /// Trust the first bot found posting matching messages in recent history.
    AutoDetect,
    /// Trust exactly this bot id.
    Pinned(String),
}

/// How resolution signals are recognised. One per deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum StrategyConfig {
    Reaction {
        emoji: String,
    },
    WorkflowMessage {
        resolution_pattern: String,
        thread_url_pattern: String,
        trust: WorkflowTrust,
    },
}

impl StrategyConfig {
    pub fn reaction(emoji: impl Into<String>) -> Self {
        StrategyConfig::Reaction {
            emoji: emoji.into(),
        }
    }

    /// Workflow strategy with the default patterns.
    pub fn workflow(trust: WorkflowTrust) -> Self {
        StrategyConfig::WorkflowMessage {
            resolution_pattern: DEFAULT_RESOLUTION_PATTERN.to_string(),
            thread_url_pattern: DEFAULT_THREAD_URL_PATTERN.to_string(),
            trust,
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::reaction(DEFAULT_RESOLUTION_EMOJI)
    }
}

/// History paging behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSettings {
    pub page_size: u32,
    /// Pause between consecutive page requests (milliseconds).
    pub page_delay_ms: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            page_delay_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    /// Channel whose history is scanned for resolutions.
    pub source_channel: String,
    /// Channel the leaderboard is posted to.
    pub destination_channel: String,
    pub strategy: StrategyConfig,
    pub retry: RetryPolicy,
    pub fetch: FetchSettings,
    pub history_scan_limit: u32,
    /// Render but do not post.
    pub dry_run: bool,
}

impl LeaderboardConfig {
    /// Config that reads and posts in the same channel.
    pub fn new(channel: impl Into<String>, strategy: StrategyConfig) -> Self {
        let channel = channel.into();
        Self {
            destination_channel: channel.clone(),
            source_channel: channel,
            strategy,
            retry: RetryPolicy::default(),
            fetch: FetchSettings::default(),
            history_scan_limit: DEFAULT_HISTORY_SCAN_LIMIT,
            dry_run: false,
        }
    }

    pub fn with_destination(mut self, channel: impl Into<String>) -> Self {
        self.destination_channel = channel.into();
        self
    }

    /// Check the config before any window is processed.
    pub fn validate(&self) -> Result<()> {
        if self.source_channel.trim().is_empty() {
            return Err(LeaderboardError::Config(
                "source channel is not set".to_string(),
            ));
        }
        if self.destination_channel.trim().is_empty() {
            return Err(LeaderboardError::Config(
                "destination channel is not set".to_string(),
            ));
        }
        if self.fetch.page_size == 0 || self.fetch.page_size > MAX_PAGE_SIZE {
            return Err(LeaderboardError::Config(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.fetch.page_size
            )));
        }
        if self.history_scan_limit == 0 {
            return Err(LeaderboardError::Config(
                "history scan limit must be positive".to_string(),
            ));
        }

        match &self.strategy {
            StrategyConfig::Reaction { emoji } => {
                if emoji.trim_matches(':').trim().is_empty() {
                    return Err(LeaderboardError::Config(
                        "resolution emoji is not set".to_string(),
                    ));
                }
            }
            StrategyConfig::WorkflowMessage {
                resolution_pattern,
                thread_url_pattern,
                trust,
            } => {
                let resolution = Regex::new(resolution_pattern)?;
                if resolution.capture_names().all(|n| n != Some("agent")) {
                    return Err(LeaderboardError::Config(
                        "resolution pattern must define an `agent` capture group".to_string(),
                    ));
                }
                let url = Regex::new(thread_url_pattern)?;
                if url.capture_names().all(|n| n != Some("url")) {
                    return Err(LeaderboardError::Config(
                        "thread URL pattern must define a `url` capture group".to_string(),
                    ));
                }
                if let WorkflowTrust::Pinned(bot_id) = trust {
                    if bot_id.trim().is_empty() {
                        return Err(LeaderboardError::Config(
                            "pinned workflow bot id is empty".to_string(),
                        ));
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = LeaderboardConfig::new("C01ABC2DEF3", StrategyConfig::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.destination_channel, "C01ABC2DEF3");
        assert_eq!(config.fetch.page_size, MAX_PAGE_SIZE);
        assert_eq!(config.history_scan_limit, 100);

        let workflow = LeaderboardConfig::new("C1", StrategyConfig::workflow(WorkflowTrust::AnyBot));
        assert!(workflow.validate().is_ok());
    }

    #[test]
    fn test_missing_channel_rejected() {
        let config = LeaderboardConfig::new("  ", StrategyConfig::default());
        let err = config.validate().unwrap_err();
        assert!(matches!(err, LeaderboardError::Config(_)));
        assert!(err.to_string().contains("source channel"));
    }

    #[test]
    fn test_empty_emoji_rejected() {
        let config = LeaderboardConfig::new("C1", StrategyConfig::reaction("::"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_page_size_bounds() {
        let mut config = LeaderboardConfig::new("C1", StrategyConfig::default());
        config.fetch.page_size = MAX_PAGE_SIZE + 1;
        assert!(config.validate().is_err());
        config.fetch.page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pattern_without_agent_group_rejected() {
        let config = LeaderboardConfig::new(
            "C1",
            StrategyConfig::WorkflowMessage {
                resolution_pattern: r"resolved by <@(\w+)>".to_string(),
                thread_url_pattern: DEFAULT_THREAD_URL_PATTERN.to_string(),
                trust: WorkflowTrust::AnyBot,
            },
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("agent"));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let config = LeaderboardConfig::new(
            "C1",
            StrategyConfig::WorkflowMessage {
                resolution_pattern: "(?P<agent>[".to_string(),
                thread_url_pattern: DEFAULT_THREAD_URL_PATTERN.to_string(),
                trust: WorkflowTrust::AutoDetect,
            },
        );
        assert!(matches!(
            config.validate(),
            Err(LeaderboardError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = LeaderboardConfig::new(
            "C1",
            StrategyConfig::workflow(WorkflowTrust::Pinned("B42".to_string())),
        )
        .with_destination("C2");
        let json = serde_json::to_string(&config).unwrap();
        let back: LeaderboardConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
