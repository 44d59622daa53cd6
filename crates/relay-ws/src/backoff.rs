//! Reconnect policy.
//!
//! Bounded exponential backoff with a hard retry ceiling. The policy only
//! counts; the connection manager owns the timer.

use std::time::Duration;

/// Outcome of a closed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Reconnect after `delay`. `attempt` is 1-based.
    Retry { attempt: u32, delay: Duration },
    /// Ceiling reached; no further attempts.
    Stop,
}

/// Retry counter with exponential delay.
///
/// delay(n) = min(base * 2^n, max) for retry n = 1..=max_retries.
/// With the defaults that is 2s, 4s, 8s, 16s, 30s.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    max_retries: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    retry_count: u32,
}

impl ReconnectPolicy {
    pub const DEFAULT_MAX_RETRIES: u32 = 5;
    pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
    pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

    pub fn new(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
            retry_count: 0,
        }
    }

    /// Session established: the next failure starts from retry 1 again.
    pub fn on_connected(&mut self) {
        self.retry_count = 0;
    }

    /// Session closed (or never opened).
    pub fn on_close(&mut self) -> ReconnectDecision {
        if self.retry_count >= self.max_retries {
            return ReconnectDecision::Stop;
        }

        self.retry_count += 1;
        ReconnectDecision::Retry {
            attempt: self.retry_count,
            delay: self.delay_for(self.retry_count),
        }
    }

    /// Delay before retry `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        // Shift is clamped; anything past 2^20 is far beyond any sane cap.
        let factor = 1u64 << retry.min(20);
        let delay = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(delay)
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn is_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_MAX_RETRIES,
            Self::DEFAULT_BASE_DELAY_MS,
            Self::DEFAULT_MAX_DELAY_MS,
        )
    }
}
