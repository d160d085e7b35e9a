use std::time::Duration;

/// Exponential reconnect schedule: `base * 2^attempt`, capped at
/// `max_delay`, for at most `max_attempts` attempts.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub base: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Backoff {
    pub fn new(base: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max_delay,
            max_attempts,
        }
    }

    /// Delay before attempt number `attempt` (0-based), or `None` once the
    /// ceiling is reached.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        Some(self.base.saturating_mul(factor).min(self.max_delay))
    }

    pub fn schedule(&self) -> Vec<Duration> {
        (0..self.max_attempts).filter_map(|a| self.delay(a)).collect()
    }
}
