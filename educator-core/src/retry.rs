//! Bounded exponential backoff for backend calls.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::{EducatorError, Result};

/// Classification of a single failed attempt.
#[derive(Debug)]
pub enum AttemptFailure {
    /// The request never reached the backend; another attempt is safe.
    Retryable(String),
    /// The backend saw the request, or the input is bad; stop now.
    Terminal(EducatorError),
}

/// Attempt count and backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy; at least one attempt is always made.
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
        }
    }

    /// Total attempts permitted.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay slept after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_delay.saturating_mul(1u32 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Async sleep abstraction so backoff can be observed in tests.
pub trait Sleeper: Send + Sync {
    /// Sleep for the given duration.
    fn sleep<'a>(&'a self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Tokio-backed sleeper used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep<'a>(&'a self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Run `attempt` until it succeeds, fails terminally, or the policy is spent.
///
/// Exhausting the policy yields [`EducatorError::BackendUnreachable`] with the
/// number of attempts made. No sleep follows the final attempt.
pub async fn run_with_retry<T, F, Fut>(
    policy: RetryPolicy,
    sleeper: &dyn Sleeper,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, AttemptFailure>>,
{
    let mut current = 0;
    loop {
        current += 1;
        match attempt(current).await {
            Ok(value) => return Ok(value),
            Err(AttemptFailure::Terminal(err)) => return Err(err),
            Err(AttemptFailure::Retryable(message)) => {
                if current >= policy.max_attempts {
                    return Err(EducatorError::BackendUnreachable {
                        attempts: current,
                        message,
                    });
                }
                let delay = policy.delay_after(current);
                log::warn!(
                    "backend attempt {current}/{} failed: {message}; retrying in {delay:?}",
                    policy.max_attempts
                );
                sleeper.sleep(delay).await;
            }
        }
    }
}
