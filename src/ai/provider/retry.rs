//! Retry with exponential backoff
//!
//! Each adapter classifies its own failures into `ErrorCategory`; this module
//! only decides, from that category, whether another attempt is made.
//! Non-retryable errors surface on the first occurrence. Once the budget is
//! spent the last error is returned unchanged. A `Retry-After` sent by the
//! server replaces the computed delay, capped at the policy's `max_delay`.

use backon::{ExponentialBuilder, Retryable};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::constants::retry as retry_constants;
use crate::types::{ReportError, Result};

/// Backoff schedule shared by all providers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,
    /// Delay before the first retry
    pub base_delay: Duration,
    pub factor: f32,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: retry_constants::MAX_RETRIES,
            base_delay: Duration::from_millis(retry_constants::BASE_DELAY_MS),
            factor: retry_constants::BACKOFF_FACTOR,
            max_delay: Duration::from_secs(retry_constants::MAX_DELAY_SECS),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            ..Self::default()
        }
    }

    /// Policy with the given base delay, mostly for tests
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Never retry
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_factor(self.factor)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
    }
}

/// Parse a `Retry-After` header given in seconds
pub(crate) fn retry_after_header(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// retry budget is spent
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, provider: &str, op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let retries = AtomicUsize::new(0);

    let result = op
        .retry(policy.backoff())
        .when(|e: &ReportError| e.is_retryable())
        .adjust(|e: &ReportError, delay: Option<Duration>| {
            // None means the budget is spent; a server hint never extends it
            delay.map(|d| e.retry_after().map_or(d, |wait| wait.min(policy.max_delay)))
        })
        .notify(|e: &ReportError, delay: Duration| {
            let attempt = retries.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                provider,
                attempt,
                max_retries = policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %e,
                "Retryable LLM error, backing off"
            );
        })
        .await;

    if result.is_ok() {
        let retried = retries.load(Ordering::Relaxed);
        if retried > 0 {
            debug!(provider, retries = retried, "LLM call succeeded after retry");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ErrorCategory, LlmError};
    use std::sync::atomic::AtomicU32;

    fn fast() -> RetryPolicy {
        RetryPolicy::default().with_base_delay(Duration::from_millis(1))
    }

    fn err(category: ErrorCategory) -> ReportError {
        LlmError::with_provider(category, "boom", "test").into()
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.base_delay, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_two_retries_then_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast(), "test", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(err(ErrorCategory::RateLimit))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&fast(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(err(ErrorCategory::Auth))
        })
        .await;

        assert!(matches!(
            result,
            Err(ReportError::Llm(LlmError {
                category: ErrorCategory::Auth,
                ..
            }))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_budget_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&fast(), "test", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::new(ErrorCategory::Transient, format!("overloaded #{}", n)).into())
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(result.unwrap_err().to_string().contains("overloaded #2"));
    }

    #[tokio::test]
    async fn test_timeout_error_is_retried() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast(), "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ReportError::timeout("completion", Duration::from_millis(5)))
            } else {
                Ok(1)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_server_retry_after_replaces_backoff() {
        // The computed backoff alone would take 30 s
        let policy = RetryPolicy::default().with_base_delay(Duration::from_secs(30));
        let calls = AtomicU32::new(0);
        let start = std::time::Instant::now();
        let result = with_retry(&policy, "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(LlmError::new(ErrorCategory::RateLimit, "slow down")
                    .retry_after(Duration::from_millis(20))
                    .into())
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(20));
        assert!(elapsed < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_retry_after_capped_by_max_delay() {
        let mut policy = fast();
        policy.max_delay = Duration::from_millis(10);
        let calls = AtomicU32::new(0);
        let start = std::time::Instant::now();
        let result = with_retry(&policy, "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(LlmError::new(ErrorCategory::RateLimit, "slow down")
                    .retry_after(Duration::from_secs(60))
                    .into())
            } else {
                Ok(())
            }
        })
        .await;

        assert!(result.is_ok());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_retry_after_does_not_extend_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&fast(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::new(ErrorCategory::RateLimit, "slow down")
                .retry_after(Duration::from_millis(1))
                .into())
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_retry_after_header_parsing() {
        let mut headers = reqwest::header::HeaderMap::new();
        assert_eq!(retry_after_header(&headers), None);
        headers.insert(reqwest::header::RETRY_AFTER, "7".parse().unwrap());
        assert_eq!(retry_after_header(&headers), Some(Duration::from_secs(7)));
        headers.insert(
            reqwest::header::RETRY_AFTER,
            "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap(),
        );
        assert_eq!(retry_after_header(&headers), None);
    }

    #[tokio::test]
    async fn test_policy_none_makes_single_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&RetryPolicy::none(), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(err(ErrorCategory::RateLimit))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
