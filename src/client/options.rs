use std::time::Duration;

use rand::Rng;

pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(2000);

/// Wait policy between failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Always wait `retry_delay`.
    Fixed,
    /// `retry_delay * 2^(n-1)` after the n-th failure, capped at `max_delay`.
    /// With `jitter`, a random delay between half and all of that.
    Exponential { max_delay: Duration, jitter: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOptions {
    /// Total attempts, including the first. Values below 1 are treated as 1.
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub track_progress: bool,
    pub backoff: Backoff,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            retry_count: DEFAULT_RETRY_COUNT,
            retry_delay: DEFAULT_RETRY_DELAY,
            track_progress: true,
            backoff: Backoff::Fixed,
        }
    }
}

impl SubmitOptions {
    pub fn attempts(&self) -> u32 {
        self.retry_count.max(1)
    }

    /// How long to wait after the `failed_attempt`-th attempt (1-based) failed.
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.retry_delay,
            Backoff::Exponential { max_delay, jitter } => {
                let factor = 2u32.saturating_pow(failed_attempt.saturating_sub(1));
                let delay = self.retry_delay.saturating_mul(factor).min(max_delay);
                if jitter && !delay.is_zero() {
                    let millis = delay.as_millis() as u64;
                    Duration::from_millis(rand::rng().random_range(millis / 2..=millis))
                } else {
                    delay
                }
            }
        }
    }
}
