//! Retry and backoff discipline shared by every transactional operation.
//!
//! An operation is attempted once and then retried up to `max_retries`
//! times while the engine reports a retryable error. Before retry `i`
//! (0-based) the caller sleeps `base_wait + i * 10ms`.
//!
//! Errors are classified on the way out:
//!
//! - retryable engine error, budget left → retry
//! - retryable engine error, budget spent → [`CoreError::Io`]
//! - engine input error → [`CoreError::Validation`], never retried
//! - anything else → returned unchanged

use crate::config::IndexConfig;
use crate::error::{CoreError, CoreResult};
use std::time::Duration;
use tracing::{debug, warn};

/// Extra wait added per retry.
const BACKOFF_STEP: Duration = Duration::from_millis(10);

/// Capped retry with incremental backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_wait: Duration,
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(max_retries: u32, base_wait: Duration) -> Self {
        Self {
            max_retries,
            base_wait,
        }
    }

    /// Creates a policy from an index configuration.
    #[must_use]
    pub fn from_config(config: &IndexConfig) -> Self {
        Self::new(config.retry_count, config.retry_wait())
    }

    /// A policy that never retries.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Returns the number of retries allowed after the first attempt.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the wait before retry `retry_index` (0-based).
    #[must_use]
    pub fn delay_for_retry(&self, retry_index: u32) -> Duration {
        self.base_wait + BACKOFF_STEP * retry_index
    }

    /// Runs `f` under the policy. `f` receives the 0-based attempt number.
    pub fn run<T, F>(&self, operation: &str, mut f: F) -> CoreResult<T>
    where
        F: FnMut(u32) -> CoreResult<T>,
    {
        let mut attempt = 0;
        loop {
            match f(attempt) {
                Ok(value) => return Ok(value),
                Err(CoreError::Engine(err)) if err.is_retryable() => {
                    if attempt >= self.max_retries {
                        warn!(
                            operation,
                            attempts = attempt + 1,
                            error = %err,
                            "retry budget exhausted"
                        );
                        return Err(CoreError::Io {
                            attempts: attempt + 1,
                            source: err,
                        });
                    }
                    let delay = self.delay_for_retry(attempt);
                    debug!(
                        operation,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after engine conflict"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(CoreError::Engine(err)) if err.is_input_error() => {
                    return Err(CoreError::validation(err.to_string()));
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&IndexConfig::default())
    }
}
