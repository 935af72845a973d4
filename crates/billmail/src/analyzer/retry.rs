//! Retry policy for calls to the extraction service.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// How a failed call should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The service asked us to slow down (HTTP 429).
    RateLimited,
    /// Network error, timeout or server-side failure.
    Transient,
    /// Anything else; retrying will not help.
    Fatal,
}

/// Errors that know how they should be retried.
pub trait Retryable {
    fn failure_class(&self) -> FailureClass;
}

/// Bounded retry with exponential backoff for rate limits.
///
/// A rate-limited call is retried until `max_attempts` calls have been made,
/// waiting `base_delay * 2^attempt` plus up to `jitter` between calls. A
/// transient failure is retried once after `transient_pause`. Any other
/// failure is returned immediately.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub jitter: Duration,
    pub transient_pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            jitter: Duration::from_secs(1),
            transient_pause: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following the zero-based `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        exponential + jitter
    }

    /// Runs `call` until it succeeds or the policy gives up, returning the
    /// last error in the latter case.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut transient_retried = false;
        let mut attempt = 0;

        loop {
            let error = match call().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            let has_budget = attempt + 1 < max_attempts;
            let delay = match error.failure_class() {
                FailureClass::RateLimited if has_budget => {
                    let delay = self.backoff(attempt);
                    log::warn!(
                        "{} rate limited, waiting {:.2}s before retry {}",
                        operation,
                        delay.as_secs_f64(),
                        attempt + 1
                    );
                    delay
                }
                FailureClass::Transient if has_budget && !transient_retried => {
                    transient_retried = true;
                    log::warn!(
                        "{} failed (attempt {}): {}; retrying once",
                        operation,
                        attempt + 1,
                        error
                    );
                    self.transient_pause
                }
                _ => {
                    log::error!(
                        "{} failed after {} attempt(s): {}",
                        operation,
                        attempt + 1,
                        error
                    );
                    return Err(error);
                }
            };

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
