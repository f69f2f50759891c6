//! Retry of individual AWS calls with exponential backoff

use crate::aws::error::AwsError;
use backon::{ExponentialBuilder, Retryable};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff parameters for one class of retryable failure
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub max_times: usize,
}

impl RetryPolicy {
    /// Short backoff for API throttling
    pub const THROTTLE: RetryPolicy = RetryPolicy {
        min_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(20),
        max_times: 4,
    };

    /// Long backoff for dependencies that clear on their own (ENIs releasing
    /// after instance termination, attachments detaching)
    pub const DEPENDENCY: RetryPolicy = RetryPolicy {
        min_delay: Duration::from_secs(10),
        max_delay: Duration::from_secs(60),
        max_times: 5,
    };

    fn backoff(self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_times)
            .with_jitter()
    }
}

/// Run `op`, retrying while the classified error is retryable.
pub async fn retry_aws<T, F, Fut>(identifier: &str, policy: RetryPolicy, op: F) -> Result<T, AwsError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AwsError>>,
{
    op.retry(policy.backoff())
        .when(AwsError::is_retryable)
        .notify(|e, dur| {
            warn!(
                identifier = %identifier,
                delay = ?dur,
                error = %e,
                "AWS call failed, retrying..."
            );
        })
        .await
}

/// [`retry_aws`] with the throttling policy
pub async fn retry_throttled<T, F, Fut>(identifier: &str, op: F) -> Result<T, AwsError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AwsError>>,
{
    retry_aws(identifier, RetryPolicy::THROTTLE, op).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const FAST: RetryPolicy = RetryPolicy {
        min_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(2),
        max_times: 3,
    };

    #[tokio::test]
    async fn retries_throttling_until_success() {
        let calls = AtomicUsize::new(0);
        let result = retry_aws("i-1", FAST, || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(AwsError::Throttled {
                    code: "Throttling".to_string(),
                })
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_errors() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = retry_aws("i-1", FAST, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AwsError::Sdk {
                code: Some("UnauthorizedOperation".to_string()),
                message: "denied".to_string(),
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_times() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = retry_aws("sg-1", FAST, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AwsError::DependencyViolation {
                code: "DependencyViolation".to_string(),
                message: "in use".to_string(),
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), FAST.max_times + 1);
    }
}
