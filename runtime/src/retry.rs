//! Linear retry policy for transient failures.
//!
//! The notification dispatcher uses [`RetryPolicy`] to decide whether a failed message gets
//! another attempt and how long to wait first. [`retry_linear`] applies the same policy to an
//! arbitrary async operation, which the server uses while waiting for the database to come up.
//!
//! # Example
//!
//! ```rust
//! use eventbooker_runtime::retry::{RetryPolicy, retry_linear};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), String> {
//! let policy = RetryPolicy::builder()
//!     .max_attempts(5)
//!     .base_delay(Duration::from_millis(100))
//!     .build();
//!
//! let value = retry_linear(&policy, || async { Ok::<_, String>(42) }).await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;
use tokio::time::sleep;

/// Default ceiling on delivery attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default base delay between attempts.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(3);

/// Retry policy with linearly growing delays.
///
/// # Default Values
///
/// - `max_attempts`: 5 (the first try counts)
/// - `base_delay`: 3 seconds; the wait after the n-th failure is `n × base_delay`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first
    pub max_attempts: u32,
    /// Unit of the linear backoff
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Create a new policy builder.
    #[must_use]
    pub const fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            max_attempts: None,
            base_delay: None,
        }
    }

    /// Whether another attempt is allowed after `failed_attempts` failures.
    #[must_use]
    pub const fn should_retry(&self, failed_attempts: u32) -> bool {
        failed_attempts < self.max_attempts
    }

    /// Wait before the next attempt, after `failed_attempts` failures.
    #[must_use]
    pub fn delay_for_attempt(&self, failed_attempts: u32) -> Duration {
        self.base_delay.saturating_mul(failed_attempts)
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    max_attempts: Option<u32>,
    base_delay: Option<Duration>,
}

impl RetryPolicyBuilder {
    /// Set the attempt ceiling.
    #[must_use]
    pub const fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set the backoff unit.
    #[must_use]
    pub const fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = Some(delay);
        self
    }

    /// Build the [`RetryPolicy`].
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            base_delay: self.base_delay.unwrap_or(DEFAULT_BASE_DELAY),
        }
    }
}

/// Retry an async operation under `policy`.
///
/// Returns the first success, or the last error once `policy.max_attempts` calls have failed.
///
/// # Errors
///
/// Returns the error of the final attempt.
pub async fn retry_linear<F, Fut, T, E>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut failed_attempts = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if failed_attempts > 0 {
                    tracing::info!(attempt = failed_attempts + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) => {
                failed_attempts += 1;
                if !policy.should_retry(failed_attempts) {
                    tracing::error!(
                        attempts = failed_attempts,
                        error = %err,
                        "Operation failed after max attempts"
                    );
                    return Err(err);
                }

                let delay = policy.delay_for_attempt(failed_attempts);
                tracing::warn!(
                    attempt = failed_attempts,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "Operation failed, retrying..."
                );
                sleep(delay).await;
            }
        }
    }
}
