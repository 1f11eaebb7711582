//! Bounded waits for LLM calls
//!
//! - `with_timeout` drops the wrapped future once the deadline passes, which
//!   aborts the in-flight HTTP request
//! - `with_cancellation` races a future against a caller-owned
//!   `CancellationToken`
//!
//! ## Usage
//!
//! ```ignore
//! use crate::ai::timeout::with_timeout;
//!
//! let result = with_timeout(
//!     Duration::from_secs(120),
//!     async { /* LLM call */ },
//!     "openai completion"
//! ).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::types::{ReportError, Result};

/// Execute an async operation with a timeout
///
/// Returns a timeout error if the operation doesn't complete within the specified duration.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(ReportError::timeout(operation_name, timeout)),
    }
}

/// Execute an async operation unless `token` fires first
///
/// A token already cancelled on entry wins without polling the future.
pub async fn with_cancellation<T, F>(token: &CancellationToken, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(ReportError::Cancelled),
        result = future => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(
            Duration::from_secs(1),
            async { Ok::<_, ReportError>(42) },
            "test operation",
        )
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result = with_timeout(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, ReportError>(42)
            },
            "slow operation",
        )
        .await;
        let err = result.unwrap_err();
        assert!(matches!(err, ReportError::Timeout { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_cancellation_drops_pending_future() {
        let token = CancellationToken::new();
        let finished = Arc::new(AtomicBool::new(false));

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let flag = finished.clone();
        let result = with_cancellation(&token, async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            flag.store(true, Ordering::SeqCst);
            Ok::<_, ReportError>(())
        })
        .await;

        assert!(matches!(result, Err(ReportError::Cancelled)));
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_precancelled_token_wins() {
        let token = CancellationToken::new();
        token.cancel();
        let result = with_cancellation(&token, async { Ok::<_, ReportError>(1) }).await;
        assert!(matches!(result, Err(ReportError::Cancelled)));
    }
}
