//! Bounded retry with exponential backoff, scoped to rate-limit failures.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::LlmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first rate-limited attempt; doubles each time
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// `base * 2^attempt`, attempt counted from 0
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Total time slept when every attempt is rate limited.
    pub fn total_backoff(&self) -> Duration {
        (0..self.max_attempts).map(|a| self.delay_for(a)).sum()
    }
}

/// Result of a retried call that did not hit a hard error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    Done(T),
    /// Every attempt was rate limited
    Exhausted { attempts: u32 },
}

/// Run `op` until it succeeds, fails with something other than a rate
/// limit, or the attempt budget runs out. Each rate-limited attempt is
/// followed by `policy.delay_for(attempt)` of sleep.
pub async fn retry_on_rate_limit<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<RetryOutcome<T>, LlmError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    for attempt in 0..policy.max_attempts {
        match op(attempt).await {
            Ok(value) => return Ok(RetryOutcome::Done(value)),
            Err(e) if e.is_rate_limit() => {
                let delay = policy.delay_for(attempt);
                warn!(
                    what,
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(RetryOutcome::Exhausted {
        attempts: policy.max_attempts,
    })
}
