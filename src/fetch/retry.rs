use std::time::Duration;

use crate::fetch::provider::ProviderError;

/// Bounded retry schedule for a single symbol's history fetch.
///
/// Attempts are numbered from 1. After a retryable failure on attempt `n`,
/// the next attempt waits `backoff_step * n`, so the delays grow linearly
/// (2 s, 4 s, 6 s with the default step).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_step: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_step,
        }
    }

    /// Delay to observe after a failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }

    /// Whether the error on attempt `attempt` warrants another try.
    pub fn should_retry(&self, err: &ProviderError, attempt: u32) -> bool {
        attempt < self.max_attempts && err.is_rate_limit()
    }
}
