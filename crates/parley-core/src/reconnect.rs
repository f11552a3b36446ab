//! Linear reconnect backoff.
//!
//! Attempt `n` (1-based) waits `base_interval * n`. Once `max_attempts`
//! reconnects have been scheduled without a successful open, the next
//! closure is terminal.

use std::time::Duration;

/// Default reconnect budget.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default backoff step.
pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_millis(3000);

/// Reconnect schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Reconnects allowed before giving up
    pub max_attempts: u32,
    /// Delay multiplied by the attempt number
    pub base_interval: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_MAX_ATTEMPTS, base_interval: DEFAULT_BASE_INTERVAL }
    }
}

impl ReconnectPolicy {
    /// Delay before 1-based attempt `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_interval.saturating_mul(attempt)
    }
}

/// Attempt counter for one session.
///
/// # Invariants
///
/// - `attempt_count() <= policy.max_attempts`
/// - The counter is zero after every successful open
#[derive(Debug, Clone)]
pub struct ReconnectState {
    policy: ReconnectPolicy,
    attempt_count: u32,
}

impl ReconnectState {
    /// Fresh counter.
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempt_count: 0 }
    }

    /// Reconnects scheduled since the last successful open.
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Schedule in use.
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// True once no further attempt may be scheduled.
    pub fn is_exhausted(&self) -> bool {
        self.attempt_count >= self.policy.max_attempts
    }

    /// Claim the next attempt, returning its number and delay. `None` once
    /// the budget is spent.
    pub fn next_attempt(&mut self) -> Option<(u32, Duration)> {
        if self.is_exhausted() {
            return None;
        }

        self.attempt_count += 1;
        Some((self.attempt_count, self.policy.delay_for(self.attempt_count)))
    }

    /// Zero the counter.
    pub fn reset(&mut self) {
        self.attempt_count = 0;
    }
}
