//! Attempt counting and timed lockout for verification flows.
//!
//! One policy shape guards email code sends, email change requests and
//! email change confirmations. Each call reads the current state and returns
//! the next state in a single decision so callers can persist it atomically.

use chrono::{DateTime, TimeDelta, Utc};

use crate::VerificationState;

/// Default number of attempts allowed before the next one locks.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default lock length in minutes.
pub const DEFAULT_LOCK_MINUTES: i64 = 5;

/// Outcome of counting an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The attempt may proceed; persist the new state.
    Allow(VerificationState),
    /// The subject is locked; nothing changed.
    DenyLocked {
        /// Time left until the lock lifts.
        remaining: TimeDelta,
    },
    /// The attempt proceeds once more but the subject is now locked.
    WillLockNow(VerificationState),
}

/// Result of clearing stale or expired locks without counting an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockResolution {
    /// No lock applies. `changed` is set when fields were cleared.
    Open {
        /// State to continue with.
        state: VerificationState,
        /// Whether the state differs from the stored one.
        changed: bool,
    },
    /// The lock is still active.
    Locked {
        /// Time left until the lock lifts.
        remaining: TimeDelta,
    },
}

/// Thresholds for one guarded action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    max_attempts: u32,
    lock_duration: TimeDelta,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            TimeDelta::minutes(DEFAULT_LOCK_MINUTES),
        )
    }
}

impl LockPolicy {
    /// Creates a policy that locks once `max_attempts` is exceeded.
    #[must_use]
    pub fn new(max_attempts: u32, lock_duration: TimeDelta) -> Self {
        Self {
            max_attempts,
            lock_duration,
        }
    }

    /// Attempts allowed before locking.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Length of a lock.
    #[must_use]
    pub fn lock_duration(&self) -> TimeDelta {
        self.lock_duration
    }

    /// Returns whether the lock fields contradict each other or the counter.
    #[must_use]
    pub fn is_ghost_lock(&self, state: &VerificationState) -> bool {
        match (state.locked, state.locked_at) {
            (true, None) => true,
            (false, Some(_)) => true,
            (false, None) => state.attempt_count > self.max_attempts,
            (true, Some(_)) => false,
        }
    }

    /// Counts one attempt and decides whether it may proceed.
    #[must_use]
    pub fn decide(&self, state: &VerificationState, now: DateTime<Utc>) -> Decision {
        if self.is_ghost_lock(state) {
            return Decision::Allow(restart(state));
        }

        if let Some(locked_at) = state.locked_at.filter(|_| state.locked) {
            let elapsed = now - locked_at;
            if elapsed < self.lock_duration {
                return Decision::DenyLocked {
                    remaining: self.lock_duration - elapsed,
                };
            }

            return Decision::Allow(restart(state));
        }

        let mut next = state.clone();
        next.attempt_count = next.attempt_count.saturating_add(1);
        if next.attempt_count > self.max_attempts {
            next.locked = true;
            next.locked_at = Some(now);
            return Decision::WillLockNow(next);
        }

        Decision::Allow(next)
    }

    /// Clears ghost and expired locks without counting an attempt.
    ///
    /// Cleared states start from a zero counter, so the next counted attempt
    /// is attempt 1.
    #[must_use]
    pub fn resolve(&self, state: &VerificationState, now: DateTime<Utc>) -> LockResolution {
        if self.is_ghost_lock(state) {
            return LockResolution::Open {
                state: cleared(state),
                changed: true,
            };
        }

        match state.locked_at.filter(|_| state.locked) {
            Some(locked_at) if now - locked_at < self.lock_duration => LockResolution::Locked {
                remaining: self.lock_duration - (now - locked_at),
            },
            Some(_) => LockResolution::Open {
                state: cleared(state),
                changed: true,
            },
            None => LockResolution::Open {
                state: state.clone(),
                changed: false,
            },
        }
    }

    /// Counts a failed confirmation against an unlocked state.
    ///
    /// Returns the next state and whether it is now locked.
    #[must_use]
    pub fn record_failure(
        &self,
        state: &VerificationState,
        now: DateTime<Utc>,
    ) -> (VerificationState, bool) {
        match self.decide(state, now) {
            Decision::Allow(next) => (next, false),
            Decision::WillLockNow(next) => (next, true),
            Decision::DenyLocked { .. } => (state.clone(), true),
        }
    }

    /// Attempts left before the next one locks.
    #[must_use]
    pub fn remaining_attempts(&self, state: &VerificationState) -> u32 {
        self.max_attempts.saturating_sub(state.attempt_count)
    }
}

fn cleared(state: &VerificationState) -> VerificationState {
    VerificationState {
        attempt_count: 0,
        locked: false,
        locked_at: None,
        ..state.clone()
    }
}

fn restart(state: &VerificationState) -> VerificationState {
    VerificationState {
        attempt_count: 1,
        ..cleared(state)
    }
}
