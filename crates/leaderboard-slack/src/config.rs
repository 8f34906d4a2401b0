//! Slack client configuration

use serde::{Deserialize, Serialize};

use crate::error::{Result, SlackError};

pub const DEFAULT_API_BASE: &str = "https://slack.com/api";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

#[derive(Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Web API base URL, without a trailing slash.
    pub api_base: String,
    /// Bot token (`xoxb-…`).
    pub token: String,
    /// Per-request timeout (milliseconds).
    pub request_timeout_ms: u64,
}

// Keep the token out of logs.
impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("api_base", &self.api_base)
            .field("token", &"<redacted>")
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

impl SlackConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token: token.into(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(SlackError::MissingToken);
        }
        if !self.api_base.starts_with("http://") && !self.api_base.starts_with("https://") {
            return Err(SlackError::InvalidConfig(format!(
                "api base must be an http(s) URL, got {}",
                self.api_base
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(SlackError::InvalidConfig(
                "request timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SlackConfig::new("xoxb-test");
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_token_rejected() {
        assert!(matches!(
            SlackConfig::new("  ").validate(),
            Err(SlackError::MissingToken)
        ));
    }

    #[test]
    fn test_bad_api_base_rejected() {
        let config = SlackConfig::new("xoxb-test").with_api_base("slack.com/api");
        assert!(matches!(
            config.validate(),
            Err(SlackError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_debug_redacts_token() {
        let rendered = format!("{:?}", SlackConfig::new("xoxb-secret"));
        assert!(!rendered.contains("xoxb-secret"));
    }
}
