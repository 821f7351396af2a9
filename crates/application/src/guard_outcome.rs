use chrono::TimeDelta;
use oasreg_domain::CodeRejection;

/// Result of a guarded email operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// The operation went through.
    Ok,
    /// The subject is locked out.
    DeniedLocked {
        /// Whole seconds until the lock lifts, rounded up.
        remaining_seconds: i64,
    },
    /// The operation went through but further attempts are now locked.
    WillLockNow {
        /// Warning to show the user.
        message: String,
    },
    /// The active code is older than its time-to-live.
    Expired,
    /// The submitted code was wrong.
    Mismatch {
        /// Attempts left before the subject is locked, when wrong codes are counted.
        remaining_attempts: Option<u32>,
    },
    /// No code is waiting for confirmation.
    NoActiveCode,
}

impl GuardOutcome {
    /// Builds a lock denial.
    #[must_use]
    pub fn denied(remaining: TimeDelta) -> Self {
        Self::DeniedLocked {
            remaining_seconds: ceil_seconds(remaining),
        }
    }

    /// Builds the lock warning for a lock of `lock_duration`.
    #[must_use]
    pub fn will_lock(lock_duration: TimeDelta) -> Self {
        Self::WillLockNow {
            message: format!(
                "too many attempts; further attempts are blocked for {} minutes",
                lock_duration.num_minutes()
            ),
        }
    }

    /// Maps a rejected code, reporting `remaining_attempts` on mismatch.
    #[must_use]
    pub fn rejected(rejection: CodeRejection, remaining_attempts: Option<u32>) -> Self {
        match rejection {
            CodeRejection::NoActiveCode => Self::NoActiveCode,
            CodeRejection::Expired => Self::Expired,
            CodeRejection::Mismatch => Self::Mismatch { remaining_attempts },
        }
    }
}

/// Rounds a duration up to whole seconds, never below zero.
#[must_use]
pub fn ceil_seconds(remaining: TimeDelta) -> i64 {
    let seconds = remaining.num_seconds();
    let rounded = if remaining.subsec_nanos() > 0 {
        seconds + 1
    } else {
        seconds
    };
    rounded.max(0)
}
