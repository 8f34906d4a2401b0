//! Execution controls for remote calls: bounded retry with exponential
//! backoff for transient failures, server-directed waits for rate limits.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{LeaderboardError, PlatformError, PlatformResult, Result};

/// Retry policy applied to every remote call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first (minimum 1).
    pub max_attempts: u32,
    /// Delay before the first transient-error retry (milliseconds); doubles
    /// on each further transient retry.
    pub initial_backoff_ms: u64,
    /// Wait used when a rate-limit response carries no retry-after hint
    /// (milliseconds).
    pub rate_limit_fallback_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1_000,
            rate_limit_fallback_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Backoff for the `step`-th transient retry (0-based).
    pub fn backoff(&self, step: u32) -> Duration {
        let scale = 2u64.saturating_pow(step.min(16));
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(scale))
    }

    fn delay_for(&self, err: &PlatformError, backoff_step: &mut u32) -> Option<Duration> {
        match err {
            PlatformError::RateLimited { retry_after } => Some(
                retry_after.unwrap_or_else(|| Duration::from_millis(self.rate_limit_fallback_ms)),
            ),
            PlatformError::Transient(_) => {
                let delay = self.backoff(*backoff_step);
                *backoff_step += 1;
                Some(delay)
            }
            _ => None,
        }
    }
}

/// Wraps single remote calls with the retry policy.
///
/// Holds no per-call state, so one executor can be shared by every stage;
/// each `execute` gets a fresh retry budget.
#[derive(Debug, Clone, Default)]
pub struct RequestExecutor {
    policy: RetryPolicy,
}

impl RequestExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, or the
    /// attempt bound is reached.
    ///
    /// Rate-limit waits count as attempts but do not advance the exponential
    /// backoff sequence.
    pub async fn execute<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PlatformResult<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut backoff_step = 0u32;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let Some(delay) = self.policy.delay_for(&err, &mut backoff_step) else {
                return Err(LeaderboardError::Platform {
                    operation: operation.to_string(),
                    source: err,
                });
            };

            if attempt >= max_attempts {
                return Err(LeaderboardError::RetryExhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                    source: err,
                });
            }

            warn!(
                operation = %operation,
                attempt = attempt,
                max_attempts = max_attempts,
                delay_ms = delay.as_millis() as u64,
                reason = %err,
                "retrying remote call"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn default_executor() -> RequestExecutor {
        RequestExecutor::new(RetryPolicy::default())
    }

    #[test]
    fn test_retry_policy_default() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.initial_backoff_ms, 1_000);
        assert_eq!(p.backoff(0), Duration::from_secs(1));
        assert_eq!(p.backoff(1), Duration::from_secs(2));
        assert_eq!(p.backoff(2), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_twice_then_success() {
        let executor = default_executor();
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let c = calls.clone();
        let value = executor
            .execute("op", move || {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(PlatformError::Transient("503".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s + 2s of backoff
        assert_eq!(started.elapsed().as_secs(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_sleeps_retry_after_without_advancing_backoff() {
        let executor = default_executor();
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let c = calls.clone();
        executor
            .execute("op", move || {
                let c = c.clone();
                async move {
                    match c.fetch_add(1, Ordering::SeqCst) {
                        0 => Err(PlatformError::RateLimited {
                            retry_after: Some(Duration::from_secs(7)),
                        }),
                        1 => Err(PlatformError::Transient("502".into())),
                        _ => Ok(()),
                    }
                }
            })
            .await
            .unwrap();

        // 7s retry-after, then the *first* backoff step (1s)
        assert_eq!(started.elapsed().as_secs(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_without_hint_uses_fallback() {
        let executor = RequestExecutor::new(RetryPolicy {
            max_attempts: 2,
            initial_backoff_ms: 1_000,
            rate_limit_fallback_ms: 5_000,
        });
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let c = calls.clone();
        executor
            .execute("op", move || {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(PlatformError::RateLimited { retry_after: None })
                    } else {
                        Ok(())
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(started.elapsed().as_secs(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_retries() {
        let executor = default_executor();
        let calls = Arc::new(AtomicU32::new(0));

        let c = calls.clone();
        let err = executor
            .execute("conversations.history", move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(PlatformError::Transient("internal_error".into()))
                }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match err {
            LeaderboardError::RetryExhausted { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected RetryExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_retryable_propagates_immediately() {
        let executor = default_executor();
        let calls = Arc::new(AtomicU32::new(0));

        let c = calls.clone();
        let err = executor
            .execute("chat.postMessage", move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(PlatformError::PermissionDenied("not_in_channel".into()))
                }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            err,
            LeaderboardError::Platform {
                source: PlatformError::PermissionDenied(_),
                ..
            }
        ));
    }
}
