//! Bounded retry around a single mutating API call
//!
//! This retries a *command* the API rejected because of a transient
//! precondition ("dependency still processing"). Waiting for an accepted
//! command to converge is the poller's job.

use crate::classify::{Classify, RetryDecision};
use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Retry configuration for mutating calls
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total time budget for retrying
    pub max_duration: Duration,

    /// Delay between attempts
    pub interval: Duration,

    /// Growth factor applied to the interval after each retry
    pub backoff_multiplier: f64,

    /// Upper bound for the grown interval
    pub max_interval: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(5 * 60),
            interval: Duration::from_secs(1),
            backoff_multiplier: 1.0,
            max_interval: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Fixed-interval retry for up to `max_duration`.
    pub fn new(max_duration: Duration) -> Self {
        Self {
            max_duration,
            ..Self::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_backoff(mut self, multiplier: f64, max_interval: Duration) -> Self {
        self.backoff_multiplier = multiplier;
        self.max_interval = max_interval;
        self
    }

    /// Delay to wait after the given (0-based) failed attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if self.backoff_multiplier <= 1.0 {
            return self.interval;
        }
        let factor = self.backoff_multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let secs = self.interval.as_secs_f64() * factor;
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_interval)
            .min(self.max_interval)
    }
}

/// Run `operation`, resubmitting it while `classifier` deems the error
/// transient and the budget in `config` lasts.
///
/// Terminal errors are returned as soon as they occur. When the budget runs
/// out on a retryable error, `operation` is called one final time and that
/// call's result is returned, so the caller sees the latest error rather
/// than a stale one.
pub async fn retry_mutation<F, Fut, T, C>(
    mut operation: F,
    classifier: &C,
    config: &RetryConfig,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    C: Classify + ?Sized,
{
    let started = Instant::now();
    let mut attempt = 0u32;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let err = match RetryDecision::classify(err, classifier) {
            RetryDecision::Retry(err) => err,
            RetryDecision::Terminal(err) => {
                tracing::debug!("Terminal error, not retrying: {}", err);
                return Err(err);
            }
        };

        let delay = config.delay_for_attempt(attempt);
        if started.elapsed().saturating_add(delay) >= config.max_duration {
            tracing::warn!(
                "Retry budget of {:?} exhausted after {} attempts, last error: {}",
                config.max_duration,
                attempt + 1,
                err
            );
            break;
        }

        tracing::debug!(
            "Retryable error on attempt {}: {} (next attempt in {:?})",
            attempt + 1,
            err,
            delay
        );
        sleep(delay).await;
        attempt += 1;
    }

    operation().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::RetryPolicy;
    use crate::error::{ApiError, CloudError};
    use std::sync::atomic::{AtomicU32, Ordering};

    const PROCESSING: &str = "Client.ResourceIncorrectState.DBSecurityGroup.Processing";

    fn processing(attempt: u32) -> CloudError {
        CloudError::Api(ApiError::new(PROCESSING, format!("attempt {}", attempt)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_returns_immediately() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::none().on_code(PROCESSING);

        let result = retry_mutation(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CloudError>("created")
            },
            &policy,
            &RetryConfig::default(),
        )
        .await;

        assert_eq!(result.unwrap(), "created");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::none().on_code(PROCESSING);

        let result = retry_mutation(
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 { Err(processing(n)) } else { Ok(n) }
            },
            &policy,
            &RetryConfig::new(Duration::from_secs(60)),
        )
        .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::none().on_code(PROCESSING);

        let result: Result<()> = retry_mutation(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CloudError::Api(ApiError::new(
                    "Client.InvalidParameterNotFound.DBInstance",
                    "",
                )))
            },
            &policy,
            &RetryConfig::default(),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_attempt_error_is_returned() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::none().on_code(PROCESSING);
        let config = RetryConfig::new(Duration::from_secs(10)).with_interval(Duration::from_secs(2));

        let started = Instant::now();
        let result: Result<()> = retry_mutation(
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(processing(n))
            },
            &policy,
            &config,
        )
        .await;

        let total = calls.load(Ordering::SeqCst);
        // attempts at 0, 2, 4, 6 and 8, then the final call
        assert_eq!(total, 6);
        let err = result.unwrap_err();
        assert_eq!(
            err.api_error().map(|e| e.message.clone()),
            Some(format!("attempt {}", total))
        );
        assert!(!err.is_timeout());
        assert!(started.elapsed() < Duration::from_secs(10) + Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_attempt_may_succeed() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::new(Duration::from_secs(3)).with_interval(Duration::from_secs(1));

        let result = retry_mutation(
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 4 { Err(processing(n)) } else { Ok(n) }
            },
            &RetryPolicy::any(),
            &config,
        )
        .await;

        assert_eq!(result.unwrap(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_interval_goes_straight_to_final_call() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::new(Duration::from_secs(60))
            .with_interval(Duration::from_secs(u64::MAX));

        let result: Result<()> = retry_mutation(
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(processing(n))
            },
            &RetryPolicy::any(),
            &config,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_delay_calculation() {
        let fixed = RetryConfig::default();
        assert_eq!(fixed.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(fixed.delay_for_attempt(7), Duration::from_secs(1));

        let grown = RetryConfig::default().with_backoff(2.0, Duration::from_secs(10));
        assert_eq!(grown.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(grown.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(grown.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(grown.delay_for_attempt(3), Duration::from_secs(8));
        assert_eq!(grown.delay_for_attempt(4), Duration::from_secs(10)); // capped at max
    }
}
