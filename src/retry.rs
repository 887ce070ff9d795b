//! Retry/backoff policy for single-shot generation.
//!
//! The delay schedule is deterministic: no jitter, no cap. The first retry
//! waits `base_delay`, the second `2x`, the third `4x`, and so on.

use std::time::Duration;

/// Attempt budget and base backoff delay.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total attempts, including the first (minimum 1).
    pub attempts: u32,
    /// Base delay; doubles after each failed attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay after the given failed attempt (1-indexed): pure in
    /// (base_delay, attempt).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(2u32.saturating_pow(exp))
    }
}

/// Retry loop state, advanced once per attempt outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum RetryState {
    /// An attempt is in flight.
    Attempting { attempt: u32 },
    /// The last attempt failed and a backoff sleep is due before the next.
    Retrying { next_attempt: u32, delay: Duration },
    Succeeded,
    /// The budget is spent; the last error is terminal.
    Exhausted { attempts: u32 },
}

/// Drives [`RetryState`] transitions against a [`RetryPolicy`].
#[derive(Debug)]
pub(crate) struct RetrySchedule {
    policy: RetryPolicy,
    state: RetryState,
}

impl RetrySchedule {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: RetryState::Attempting { attempt: 1 },
        }
    }

    /// 1-based index of the attempt currently in flight.
    pub fn attempt(&self) -> u32 {
        match self.state {
            RetryState::Attempting { attempt } => attempt,
            RetryState::Retrying { next_attempt, .. } => next_attempt,
            RetryState::Succeeded | RetryState::Exhausted { .. } => self.policy.attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.policy.attempts.max(1)
    }

    pub fn on_success(&mut self) -> RetryState {
        self.state = RetryState::Succeeded;
        self.state.clone()
    }

    /// Record a failed attempt: either schedules a backoff sleep or declares
    /// the budget exhausted.
    pub fn on_failure(&mut self) -> RetryState {
        let attempt = self.attempt();
        self.state = if attempt < self.max_attempts() {
            RetryState::Retrying {
                next_attempt: attempt + 1,
                delay: self.policy.delay_for(attempt),
            }
        } else {
            RetryState::Exhausted { attempts: attempt }
        };
        self.state.clone()
    }

    /// Acknowledge the backoff sleep and move into the next attempt.
    pub fn begin_next_attempt(&mut self) {
        if let RetryState::Retrying { next_attempt, .. } = self.state {
            self.state = RetryState::Attempting {
                attempt: next_attempt,
            };
        }
    }
}
