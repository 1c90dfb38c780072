//! Retry policy with exponential backoff
//!
//! Blocking variant: the flusher and coalescer workers run on plain threads,
//! so backoff sleeps the calling thread.

use std::time::Duration;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_backoff: Duration,

    /// Upper bound on any single delay
    pub max_backoff: Duration,

    /// Backoff multiplier
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    /// One attempt: any failure is surfaced immediately
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    /// Never retry
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Retry with doubling backoff, capped at 10 seconds
    pub fn exponential(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let factor = self.multiplier.powi(retry as i32 - 1);
        let secs = (self.initial_backoff.as_secs_f64() * factor).min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(secs)
    }

    /// Execute a blocking operation with retry logic
    ///
    /// Returns the final result together with the number of attempts made.
    /// Non-retryable errors are returned after the attempt that produced them.
    pub fn run<T, F>(&self, mut op: F) -> (Result<T>, u32)
    where
        F: FnMut() -> Result<T>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match op() {
                Ok(value) => return (Ok(value), attempt),
                Err(e) if !e.is_retryable() || attempt >= max_attempts => {
                    return (Err(e), attempt);
                }
                Err(e) => {
                    let delay = self.backoff_for(attempt);
                    tracing::warn!(
                        "Attempt {}/{} failed: {}; retrying in {:?}",
                        attempt,
                        max_attempts,
                        e,
                        delay
                    );
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                }
            }
        }
    }
}

impl From<u32> for RetryPolicy {
    /// `n` retries after the first attempt, starting at 10 ms
    fn from(retries: u32) -> Self {
        if retries == 0 {
            Self::none()
        } else {
            Self::exponential(retries + 1, Duration::from_millis(10))
        }
    }
}
