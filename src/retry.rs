use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

use crate::clock::Sleeper;
use crate::error::CapabilityError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(5);

/// Exponential backoff without jitter: `base_delay * 2^k` after failed attempt `k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay slept after the failed attempt `attempt` (0-indexed).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

#[derive(Debug, PartialEq)]
pub enum RetryOutcome<T> {
    Succeeded { value: T, attempts: u32 },
    /// The attempt budget was spent, or the collaborator reported a
    /// permanent error. Either way the item is finished.
    Exhausted {
        attempts: u32,
        last_error: CapabilityError,
    },
}

impl<T> RetryOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }
}

pub struct RetryController {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryController {
    pub fn new(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    pub async fn run<T, F, Fut>(&self, item: &str, mut op: F) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CapabilityError>>,
    {
        let max_attempts = self.policy.max_attempts;
        let mut attempt = 0u32;

        loop {
            let err = match op().await {
                Ok(value) => {
                    return RetryOutcome::Succeeded {
                        value,
                        attempts: attempt + 1,
                    }
                }
                Err(err) => err,
            };

            let attempts = attempt + 1;
            if !err.is_retryable() || attempts >= max_attempts {
                error!(
                    item = %item,
                    attempts = attempts,
                    kind = err.kind(),
                    error = %err,
                    "Giving up on item"
                );
                return RetryOutcome::Exhausted {
                    attempts,
                    last_error: err,
                };
            }

            let delay = self.policy.delay_after(attempt);
            warn!(
                item = %item,
                attempt = attempts,
                max_attempts = max_attempts,
                delay_secs = delay.as_secs_f64(),
                error = %err,
                "Attempt failed, retrying"
            );
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }
}
