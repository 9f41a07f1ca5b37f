//! Retry policy and the generic retry loop.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Backoff strategy for retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed,
    /// Exponential backoff: base * 2^(attempt-1)
    Exponential,
    /// Linear backoff: base * attempt
    #[default]
    Linear,
}

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of executions, including the first (minimum 1)
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
    /// Backoff strategy
    pub strategy: BackoffStrategy,
    /// Jitter factor (0.0-1.0)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    /// 20 attempts, waits growing by 100 ms up to 2 s.
    fn default() -> Self {
        Self {
            max_attempts: 20,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            strategy: BackoffStrategy::Linear,
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Constant `delay` between at most `max_attempts` executions.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
            jitter: 0.0,
        }
    }

    /// Wait after failed execution number `attempt` (1-indexed), capped at
    /// `max_delay` before jitter is applied.
    ///
    /// Jitter is deterministic: attempts cycle through no change, `+jitter`
    /// and `-jitter` of the capped delay.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let growth = match self.strategy {
            BackoffStrategy::Fixed => 1,
            BackoffStrategy::Linear => attempt,
            BackoffStrategy::Exponential => 1_u32.checked_shl(attempt - 1).unwrap_or(u32::MAX),
        };
        let capped = self.base_delay.saturating_mul(growth).min(self.max_delay);

        let fraction = if self.jitter.is_finite() { self.jitter.clamp(0.0, 1.0) } else { 0.0 };
        let spread = capped.mul_f64(fraction);
        match attempt % 3 {
            0 => capped.saturating_sub(spread),
            2 => capped.saturating_add(spread),
            _ => capped,
        }
    }

    /// Whether another execution is allowed after `attempt` executions.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts.max(1)
    }
}

/// Run `body` until it succeeds, fails with a non-retryable error, or the
/// policy runs out of attempts.
///
/// `body` receives the 1-indexed attempt number. Every attempt must be safe
/// to repeat from scratch.
pub fn with_retry<T, E>(
    policy: &RetryPolicy,
    is_retryable: impl Fn(&E) -> bool,
    mut body: impl FnMut(u32) -> Result<T, E>,
) -> Result<T, E>
where
    E: core::fmt::Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match body(attempt) {
            Ok(value) => return Ok(value),
            Err(err) if is_retryable(&err) && policy.should_retry(attempt) => {
                let delay = policy.delay_for_attempt(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying");
                thread::sleep(delay);
            }
            Err(err) => {
                if is_retryable(&err) {
                    warn!(attempt, error = %err, "retries exhausted");
                }
                return Err(err);
            }
        }
    }
}
