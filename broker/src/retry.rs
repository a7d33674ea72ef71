//! Bounded retry with linear backoff.
//!
//! Connection establishment and the consume loop's recovery path both run on
//! the same budget: a fixed number of attempts with a delay that grows by the
//! attempt index (1s after the first failure, 2s after the second, …). The
//! budget lives in a value object so it is independently testable and so no
//! code path retries by recursing into itself.

use std::time::Duration;
use tokio::time::sleep;

/// Retry budget: maximum attempts plus a linear delay step.
///
/// The delay after attempt `n` (1-based) is `n * step`. Defaults match the
/// connection policy: 5 attempts, 1 second step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            step: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Policy with an explicit budget.
    #[must_use]
    pub const fn new(max_attempts: u32, step: Duration) -> Self {
        Self { max_attempts, step }
    }

    /// Total number of attempts before giving up.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to sleep after the given (1-based) failed attempt.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt)
    }
}

/// Run `operation` under `policy`, sleeping the policy's delay between
/// attempts.
///
/// # Errors
///
/// Returns the last error once the budget is exhausted.
pub async fn retry_with_backoff<F, Fut, T, E>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) => {
                if attempt >= policy.max_attempts() {
                    tracing::error!(attempt, error = %err, "Operation failed after max attempts");
                    return Err(err);
                }

                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = policy.max_attempts(),
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "Operation failed, retrying"
                );
                sleep(delay).await;
            }
        }
    }
}
