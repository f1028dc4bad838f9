//! Explicit retry policy with exponential backoff.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

/// How a transient failure is retried.
///
/// Delays double from `min_delay` after each failed attempt and are capped
/// at `max_delay`. With jitter, each delay is drawn uniformly between
/// `min_delay` and the computed delay, so it stays within both bounds.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }
}

/// Result of an operation run under a [`RetryPolicy`].
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    /// Attempts made, including the first one.
    pub attempts: u32,
}

impl<T, E> RetryOutcome<T, E> {
    /// Attempts beyond the first.
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

impl RetryPolicy {
    /// Backoff before the next attempt, after `failed_attempts` failures.
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(31);
        let base = self
            .min_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
            .max(self.min_delay);

        if !self.jitter || base <= self.min_delay {
            return base;
        }

        let low = self.min_delay.as_millis() as u64;
        let high = base.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(low..=high))
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or runs out of attempts.
    ///
    /// Each retry is logged with its attempt number and delay.
    pub async fn run<T, E, F, Fut>(
        &self,
        operation: &str,
        mut f: F,
        is_retryable: impl Fn(&E) -> bool,
    ) -> RetryOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match f().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(operation, attempt, "Succeeded after retry");
                    }
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                    };
                }
                Err(e) => {
                    if !is_retryable(&e) {
                        debug!(operation, error = %e, "Non-retryable error encountered");
                        return RetryOutcome {
                            result: Err(e),
                            attempts: attempt,
                        };
                    }
                    if attempt >= max_attempts {
                        warn!(operation, attempts = attempt, error = %e, "Retries exhausted");
                        return RetryOutcome {
                            result: Err(e),
                            attempts: attempt,
                        };
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
