//! Error taxonomy for the leaderboard pipeline.
//!
//! [`PlatformError`] classifies a single failed remote call; the
//! [`RequestExecutor`](crate::executor::RequestExecutor) decides from that
//! class whether to retry. [`LeaderboardError`] is what pipeline stages
//! return once a call has been given up on.

use std::time::Duration;

/// Errors reported by a [`ChatPlatform`](crate::platform::ChatPlatform) call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("transient service error: {0}")]
    Transient(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("api error: {0}")]
    Api(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl PlatformError {
    /// Whether the executor may retry a call that failed with this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PlatformError::RateLimited { .. } | PlatformError::Transient(_)
        )
    }
}

/// Result type for platform calls.
pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// Pipeline-level errors.
#[derive(Debug, thiserror::Error)]
pub enum LeaderboardError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{operation} failed: {source}")]
    Platform {
        operation: String,
        #[source]
        source: PlatformError,
    },

    #[error("{operation} failed after {attempts} attempt(s): {source}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: PlatformError,
    },

    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LeaderboardError {
    /// The underlying platform error, if this failure came from a remote call.
    pub fn platform_error(&self) -> Option<&PlatformError> {
        match self {
            LeaderboardError::Platform { source, .. }
            | LeaderboardError::RetryExhausted { source, .. } => Some(source),
            _ => None,
        }
    }

    /// `true` when the remote side reported the target as gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self.platform_error(), Some(PlatformError::NotFound(_)))
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, LeaderboardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classes() {
        assert!(PlatformError::RateLimited { retry_after: None }.is_retryable());
        assert!(PlatformError::Transient("503".into()).is_retryable());
        assert!(!PlatformError::PermissionDenied("missing_scope".into()).is_retryable());
        assert!(!PlatformError::NotFound("message_not_found".into()).is_retryable());
    }

    #[test]
    fn test_retry_exhausted_display() {
        let err = LeaderboardError::RetryExhausted {
            operation: "conversations.history".to_string(),
            attempts: 3,
            source: PlatformError::Transient("service_unavailable".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("conversations.history"));
        assert!(msg.contains("3 attempt(s)"));
        assert!(msg.contains("service_unavailable"));
    }

    #[test]
    fn test_not_found_detection() {
        let err = LeaderboardError::Platform {
            operation: "reactions.get".to_string(),
            source: PlatformError::NotFound("message_not_found".to_string()),
        };
        assert!(err.is_not_found());
        assert!(!LeaderboardError::Config("missing channel".into()).is_not_found());
    }
}
