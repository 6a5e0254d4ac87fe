//! Reconnect backoff policy.
//!
//! Deterministic exponential backoff with a cap:
//! `delay(attempt) = min(base_delay * 2^attempt, max_delay)`, where `attempt`
//! starts at 1 for the first retry. With the defaults the sequence is
//! 2s, 4s, 8s, 16s, 30s, after which the ceiling is reached.

use std::time::Duration;

/// Default maximum number of automatic reconnect attempts
pub const DEFAULT_RECONNECT_CEILING: u32 = 5;

/// Default base delay
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1_000);

/// Default delay cap
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);

/// Backoff configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Maximum number of automatic reconnect attempts
    pub ceiling: u32,
    /// Base delay multiplied by `2^attempt`
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            ceiling: DEFAULT_RECONNECT_CEILING,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl BackoffPolicy {
    /// Delay before the given (1-based) attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Attempt counter driven by the connection manager.
///
/// Reset to zero on every successful `Connected` transition, so backoff never
/// accumulates across healthy sessions.
#[derive(Debug, Clone)]
pub struct ReconnectState {
    policy: BackoffPolicy,
    attempts: u32,
}

impl ReconnectState {
    /// Create a counter at zero attempts
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Attempts made since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Configured ceiling
    pub fn ceiling(&self) -> u32 {
        self.policy.ceiling
    }

    /// Whether no further automatic attempt is allowed
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.policy.ceiling
    }

    /// Reserve the next attempt.
    ///
    /// Returns the delay to wait before it, or `None` once the ceiling is
    /// reached (the counter is left unchanged in that case).
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.attempts += 1;
        Some(self.policy.delay_for(self.attempts))
    }

    /// Clear the attempt counter
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}
