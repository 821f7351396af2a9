//! Whole-account suspension after consecutive hard failures.
//!
//! Password failures and device QR decryption failures share one counter.
//! The lockout is evaluated before the sensitive operation so a suspended
//! account never reaches credential validation.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Consecutive failures that suspend an account.
pub const DEFAULT_SUSPEND_THRESHOLD: u32 = 4;

/// Minutes a suspended account waits before it is reactivated.
pub const DEFAULT_UNLOCK_DELAY_MINUTES: i64 = 15;

/// Login lock state for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLockState {
    /// Whether the account is usable.
    pub active: bool,
    /// Consecutive hard failures.
    pub fail_count: u32,
    /// When the most recent failure happened.
    pub last_fail_at: Option<DateTime<Utc>>,
}

impl Default for AccountLockState {
    fn default() -> Self {
        Self {
            active: true,
            fail_count: 0,
            last_fail_at: None,
        }
    }
}

/// Result of admitting an authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The attempt may continue to credential validation.
    Proceed {
        /// State to continue with.
        state: AccountLockState,
        /// Whether a suspension was lifted or repaired by this admission.
        changed: bool,
    },
    /// The account is suspended; the attempt must be rejected untouched.
    Suspended {
        /// Time left until reactivation.
        remaining: TimeDelta,
    },
}

/// Result of recording a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOutcome {
    /// The account is still active.
    StillActive {
        /// Failures left before suspension.
        remaining_attempts: u32,
    },
    /// The failure suspended the account.
    Suspended {
        /// Time until reactivation.
        unlock_in: TimeDelta,
    },
}

/// Thresholds for account suspension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginLockout {
    threshold: u32,
    unlock_delay: TimeDelta,
}

impl Default for LoginLockout {
    fn default() -> Self {
        Self::new(
            DEFAULT_SUSPEND_THRESHOLD,
            TimeDelta::minutes(DEFAULT_UNLOCK_DELAY_MINUTES),
        )
    }
}

impl LoginLockout {
    /// Creates a lockout that suspends after `threshold` consecutive failures.
    #[must_use]
    pub fn new(threshold: u32, unlock_delay: TimeDelta) -> Self {
        Self {
            threshold: threshold.max(1),
            unlock_delay,
        }
    }

    /// Consecutive failures that suspend.
    #[must_use]
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Suspension length.
    #[must_use]
    pub fn unlock_delay(&self) -> TimeDelta {
        self.unlock_delay
    }

    /// Returns whether the state is suspended without a failure timestamp.
    #[must_use]
    pub fn is_inconsistent(&self, state: &AccountLockState) -> bool {
        !state.active && state.last_fail_at.is_none()
    }

    /// Decides whether an authentication attempt may proceed.
    #[must_use]
    pub fn admit(&self, state: &AccountLockState, now: DateTime<Utc>) -> Admission {
        if state.active {
            return Admission::Proceed {
                state: state.clone(),
                changed: false,
            };
        }

        match state.last_fail_at {
            Some(last_fail_at) if now - last_fail_at < self.unlock_delay => Admission::Suspended {
                remaining: self.unlock_delay - (now - last_fail_at),
            },
            _ => Admission::Proceed {
                state: AccountLockState::default(),
                changed: true,
            },
        }
    }

    /// Counts a hard failure on an admitted state.
    #[must_use]
    pub fn record_failure(
        &self,
        state: &AccountLockState,
        now: DateTime<Utc>,
    ) -> (AccountLockState, FailureOutcome) {
        let fail_count = state.fail_count.saturating_add(1);
        let active = fail_count < self.threshold;
        let next = AccountLockState {
            active,
            fail_count,
            last_fail_at: Some(now),
        };

        let outcome = if active {
            FailureOutcome::StillActive {
                remaining_attempts: self.threshold - fail_count,
            }
        } else {
            FailureOutcome::Suspended {
                unlock_in: self.unlock_delay,
            }
        };

        (next, outcome)
    }

    /// Clears the failure counter after a success. Returns `None` when nothing changed.
    #[must_use]
    pub fn record_success(&self, state: &AccountLockState) -> Option<AccountLockState> {
        (state.fail_count > 0 || state.last_fail_at.is_some() || !state.active)
            .then(AccountLockState::default)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn base_time() -> DateTime<Utc> {
        DateTime::from_timestamp(1_760_000_000, 0).unwrap_or_default()
    }

    #[test]
    fn four_consecutive_failures_suspend() {
        let lockout = LoginLockout::default();
        let mut state = AccountLockState::default();

        for attempt in 1..=3_u32 {
            let (next, outcome) = lockout.record_failure(&state, base_time());
            assert!(next.active);
            assert_eq!(
                outcome,
                FailureOutcome::StillActive {
                    remaining_attempts: 4 - attempt
                }
            );
            state = next;
        }

        let (suspended, outcome) = lockout.record_failure(&state, base_time());
        assert!(!suspended.active);
        assert_eq!(suspended.fail_count, 4);
        assert_eq!(
            outcome,
            FailureOutcome::Suspended {
                unlock_in: TimeDelta::minutes(15)
            }
        );
    }

    #[test]
    fn suspended_account_is_rejected_until_delay_elapses() {
        let lockout = LoginLockout::default();
        let state = AccountLockState {
            active: false,
            fail_count: 4,
            last_fail_at: Some(base_time()),
        };

        assert_eq!(
            lockout.admit(&state, base_time() + TimeDelta::minutes(10)),
            Admission::Suspended {
                remaining: TimeDelta::minutes(5)
            }
        );

        assert_eq!(
            lockout.admit(&state, base_time() + TimeDelta::minutes(15)),
            Admission::Proceed {
                state: AccountLockState::default(),
                changed: true
            }
        );
    }

    #[test]
    fn suspension_without_timestamp_is_repaired() {
        let lockout = LoginLockout::default();
        let state = AccountLockState {
            active: false,
            fail_count: 4,
            last_fail_at: None,
        };
        assert!(lockout.is_inconsistent(&state));
        assert!(matches!(
            lockout.admit(&state, base_time()),
            Admission::Proceed { changed: true, .. }
        ));
    }

    #[test]
    fn success_resets_only_dirty_state() {
        let lockout = LoginLockout::default();
        assert_eq!(lockout.record_success(&AccountLockState::default()), None);

        let dirty = AccountLockState {
            active: true,
            fail_count: 2,
            last_fail_at: Some(base_time()),
        };
        assert_eq!(
            lockout.record_success(&dirty),
            Some(AccountLockState::default())
        );
    }

    proptest! {
        #[test]
        fn suspended_state_always_keeps_failure_timestamp(
            failures in 1_u32..12,
            offset in 0_i64..10_000,
        ) {
            let lockout = LoginLockout::default();
            let mut state = AccountLockState::default();
            let now = base_time() + TimeDelta::seconds(offset);
            for _ in 0..failures {
                if let Admission::Proceed { state: admitted, .. } = lockout.admit(&state, now) {
                    state = lockout.record_failure(&admitted, now).0;
                }
            }
            prop_assert!(state.active || state.last_fail_at.is_some());
            prop_assert_eq!(state.active, failures < 4);
        }
    }
}
