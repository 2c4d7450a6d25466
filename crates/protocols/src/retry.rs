//! Bounded retry around fallible async actions.
//!
//! No jitter is applied: failover across RPC endpoints already spreads load.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// How many times, and how far apart, a failed action is retried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryPolicy {
    /// Single attempt.
    None,
    /// Up to `max_retries` extra attempts with a constant delay.
    Fixed { max_retries: u32, delay: Duration },
    /// Up to `max_retries` extra attempts, delay multiplied by `factor` each time.
    Backoff {
        max_retries: u32,
        delay: Duration,
        factor: f64,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::Fixed {
            max_retries: 3,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// `max_retries` extra attempts, `delay` apart.
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        RetryPolicy::Fixed { max_retries, delay }
    }

    /// `max_retries` extra attempts; the wait starts at `delay` and grows by
    /// `factor` after each one. A non-finite or negative factor acts as 1.
    pub fn backoff(max_retries: u32, delay: Duration, factor: f64) -> Self {
        RetryPolicy::Backoff {
            max_retries,
            delay,
            factor,
        }
    }

    pub fn is_none(&self) -> bool {
        self.max_retries() == 0
    }

    pub fn max_retries(&self) -> u32 {
        match self {
            RetryPolicy::None => 0,
            RetryPolicy::Fixed { max_retries, .. } | RetryPolicy::Backoff { max_retries, .. } => {
                *max_retries
            }
        }
    }

    /// Delay to wait before retry number `retry` (zero-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        match self {
            RetryPolicy::None => Duration::ZERO,
            RetryPolicy::Fixed { delay, .. } => *delay,
            RetryPolicy::Backoff { delay, factor, .. } => {
                let factor = if factor.is_finite() && *factor >= 0.0 {
                    *factor
                } else {
                    1.0
                };
                let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
                Duration::try_from_secs_f64(delay.as_secs_f64() * factor.powi(exponent))
                    .unwrap_or(Duration::MAX)
            }
        }
    }
}

/// Runs `action` until it succeeds or the policy is spent.
///
/// The final error is returned exactly as the action produced it.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, action: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    retry_if(policy, action, |_| true).await
}

/// Like [`retry`], but an error for which `retryable` is false is returned
/// at once without further attempts.
pub async fn retry_if<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    mut action: F,
    retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_retries = policy.max_retries();
    let mut retries = 0;

    loop {
        match action().await {
            Ok(value) => return Ok(value),
            Err(e) if retries >= max_retries => return Err(e),
            Err(e) if !retryable(&e) => {
                warn!(attempt = retries + 1, error = %e, "Action failed with a permanent error");
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay_for(retries);
                retries += 1;
                warn!(
                    attempt = retries,
                    max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Action failed, retrying"
                );
                sleep(delay).await;
            }
        }
    }
}
