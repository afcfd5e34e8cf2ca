use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lower bound for retry intervals, in seconds.
pub const MIN_RETRY_INTERVAL: u64 = 1;
/// Upper bound for retry intervals, in seconds.
pub const MAX_RETRY_INTERVAL: u64 = 600;

/// 重试策略
///
/// Intervals are already clamped to `[MIN_RETRY_INTERVAL, MAX_RETRY_INTERVAL]`
/// and `max_interval >= min_interval`. Build it through
/// [`RetryPolicy::new`] to get those guarantees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub min_interval_seconds: u64,
    pub max_interval_seconds: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, min_interval_seconds: u64, max_interval_seconds: u64) -> Self {
        let min = min_interval_seconds.clamp(MIN_RETRY_INTERVAL, MAX_RETRY_INTERVAL);
        let max = max_interval_seconds.clamp(MIN_RETRY_INTERVAL, MAX_RETRY_INTERVAL).max(min);
        Self {
            max_retries,
            min_interval_seconds: min,
            max_interval_seconds: max,
        }
    }

    /// Single attempt, no waits.
    pub fn no_retry() -> Self {
        Self::new(0, MIN_RETRY_INTERVAL, MIN_RETRY_INTERVAL)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    pub fn start(&self) -> RetryState {
        RetryState {
            attempts_left: self.max_retries,
            current_interval_seconds: self.min_interval_seconds,
            min_interval_seconds: self.min_interval_seconds,
            max_interval_seconds: self.max_interval_seconds,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::no_retry()
    }
}

/// 单次逻辑分发的重试状态
///
/// `current_interval_seconds` stays within `[min, max]` at all times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    attempts_left: u32,
    current_interval_seconds: u64,
    min_interval_seconds: u64,
    max_interval_seconds: u64,
}

impl RetryState {
    pub fn attempts_left(&self) -> u32 {
        self.attempts_left
    }

    pub fn current_interval_seconds(&self) -> u64 {
        self.current_interval_seconds
    }

    pub fn has_attempts_left(&self) -> bool {
        self.attempts_left > 0
    }

    /// Consumes one retry and returns how long to wait before it.
    /// `None` once the retries are exhausted.
    pub fn next_wait(&mut self) -> Option<Duration> {
        if self.attempts_left == 0 {
            return None;
        }
        self.attempts_left -= 1;

        let wait = self.current_interval_seconds;
        self.current_interval_seconds = wait
            .saturating_mul(2)
            .clamp(self.min_interval_seconds, self.max_interval_seconds);

        Some(Duration::from_secs(wait))
    }
}
