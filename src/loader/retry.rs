//! Bounded retry with exponential backoff

use crate::error::{LoaderError, Result};
use std::time::Duration;
use tracing::warn;

/// Retries an operation up to `max_attempts` times, sleeping
/// `base * 2^failures` between attempts
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    base: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the next attempt after `failures` consecutive failures
    pub fn delay_after(&self, failures: u32) -> Duration {
        self.base.saturating_mul(2u32.saturating_pow(failures))
    }

    /// Run `operation` until it succeeds or attempts run out. The closure
    /// receives the 1-based attempt number.
    pub fn run<T>(&self, label: &str, mut operation: impl FnMut(u32) -> Result<T>) -> Result<T> {
        let mut attempt = 1;
        loop {
            match operation(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.max_attempts => {
                    return Err(LoaderError::RetriesExhausted {
                        attempts: attempt,
                        last_error: e.to_string(),
                    });
                }
                Err(e) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        "{} attempt {} failed: {}. Retrying in {:?}",
                        label, attempt, e, delay
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}
