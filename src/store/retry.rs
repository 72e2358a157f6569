//! Bounded retry with exponential backoff for remote store calls.
//!
//! The remote store throttles aggressively, so every call the gateway makes
//! goes through this policy. Only [`StoreError::RateLimited`] is retried;
//! anything else propagates on first occurrence. The policy is stateless
//! across invocations: there is no shared counter or circuit breaker, each
//! `run` owns its own attempt budget.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::{StoreError, StoreResult};

/// Default number of attempts per logical call.
const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default delay before the first retry.
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(500);

/// Retry configuration for remote store calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempt budget (attempts are indexed `0..max_retries`).
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: DEFAULT_INITIAL_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with an explicit budget and initial delay.
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            initial_delay,
        }
    }

    /// Backoff delay after a failed attempt: `initial_delay * 2^attempt`,
    /// no jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(31); // prevent shift overflow
        let multiplier = 1u64 << exponent;
        let millis = (self.initial_delay.as_millis() as u64).saturating_mul(multiplier);
        Duration::from_millis(millis)
    }

    /// Run `operation` through the policy.
    ///
    /// Returns the first successful result. On a rate-limit failure the task
    /// sleeps for the backoff delay and tries again until the budget is
    /// exhausted, at which point the last rate-limit error is returned. Any
    /// other error is returned immediately without further attempts.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut last_error: Option<StoreError> = None;

        for attempt in 0..self.max_retries {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_rate_limit() => {
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        "store call rate limited, backing off"
                    );
                    last_error = Some(err);
                    if attempt + 1 < self.max_retries {
                        tokio::time::sleep(self.delay_for(attempt)).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }

        // Budget exhausted; every attempt was rate limited.
        Err(last_error.unwrap_or_else(|| {
            StoreError::RateLimited("retry budget exhausted".to_string())
        }))
    }
}
