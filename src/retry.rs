//! Bounded retry with fixed backoff and jitter.
//!
//! The orchestrator is the only place that retries. Login steps, page loads
//! and article extractions each report a typed error, and [`RetryPolicy::run`]
//! decides from [`Retryable`] whether another attempt is worth making.
//!
//! # Backoff
//!
//! ```text
//! delay = backoff + random_jitter(0..=jitter)
//! ```

use crate::error::{AuthError, CrawlError};
use rand::{Rng, rng};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, instrument, warn};

/// Errors that know whether retrying can help.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for CrawlError {
    fn is_retryable(&self) -> bool {
        CrawlError::is_retryable(self)
    }
}

impl Retryable for AuthError {
    fn is_retryable(&self) -> bool {
        !self.is_fatal()
    }
}

/// How many times to try, and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; at least one is always made.
    pub max_attempts: usize,
    pub backoff: Duration,
    pub jitter: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, backoff: Duration, jitter: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            jitter,
        }
    }

    /// Delay before the next attempt.
    pub fn delay(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter_ms: u64 = rng().random_range(0..=jitter_ms);
        self.backoff + Duration::from_millis(jitter_ms)
    }

    /// Run `op` until it succeeds, fails terminally, or attempts run out.
    ///
    /// # Arguments
    ///
    /// * `what` - Label for log lines
    /// * `op` - The operation; receives the 1-based attempt number
    ///
    /// # Returns
    ///
    /// The first success, or the last error seen.
    #[instrument(level = "debug", skip(self, op))]
    pub async fn run<T, E, F>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        E: Retryable + fmt::Display,
        F: AsyncFnMut(usize) -> Result<T, E>,
    {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let attempt_t0 = Instant::now();
            let e = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !e.is_retryable() {
                warn!(what, attempt, error = %e, "Terminal failure; not retrying");
                return Err(e);
            }
            if attempt >= self.max_attempts {
                error!(
                    what,
                    attempt,
                    max = self.max_attempts,
                    elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                    error = %e,
                    "Retries exhausted"
                );
                return Err(e);
            }

            let delay = self.delay();
            warn!(
                what,
                attempt,
                max = self.max_attempts,
                elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64,
                ?delay,
                error = %e,
                "Attempt failed; backing off"
            );
            sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExtractError, NetworkError};

    fn instant() -> RetryPolicy {
        RetryPolicy::new(3, Duration::ZERO, Duration::ZERO)
    }

    fn timeout() -> CrawlError {
        NetworkError::Timeout {
            url: "https://www.ft.com/world".into(),
        }
        .into()
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let mut calls = 0;
        let result: Result<&str, CrawlError> = instant()
            .run("section", async |attempt| {
                calls += 1;
                if attempt < 3 { Err(timeout()) } else { Ok("loaded") }
            })
            .await;
        assert_eq!(result.unwrap(), "loaded");
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_terminal_error_is_not_retried() {
        let mut calls = 0;
        let result: Result<(), CrawlError> = instant()
            .run("article", async |_| {
                calls += 1;
                Err(ExtractError::Paywalled.into())
            })
            .await;
        assert!(matches!(result, Err(CrawlError::Extract(ExtractError::Paywalled))));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: Result<(), CrawlError> = instant()
            .run("article", async |_| {
                calls += 1;
                Err(timeout())
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_delay_stays_within_jitter() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100), Duration::from_millis(20));
        for _ in 0..50 {
            let d = policy.delay();
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(120));
        }
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, Duration::ZERO).max_attempts, 1);
    }
}
