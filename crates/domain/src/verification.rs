//! Email verification state and one-time code rules.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, TimeDelta, Utc};
use oasreg_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Number of decimal digits in a verification code.
pub const VERIFICATION_CODE_LENGTH: usize = 6;

/// Minutes a verification code stays valid after it was issued.
pub const VERIFICATION_CODE_TTL_MINUTES: i64 = 5;

/// Purpose a verification state guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationPurpose {
    /// Initial email ownership check after registration.
    EmailAuth,
    /// Re-authentication of a new address during an email change.
    EmailReauth,
}

impl VerificationPurpose {
    /// All purposes, in storage order.
    pub const ALL: [Self; 2] = [Self::EmailAuth, Self::EmailReauth];

    /// Returns the storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmailAuth => "email_auth",
            Self::EmailReauth => "email_reauth",
        }
    }

    /// Parses a storage string.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "email_auth" => Ok(Self::EmailAuth),
            "email_reauth" => Ok(Self::EmailReauth),
            _ => Err(AppError::Validation(format!(
                "unknown verification purpose '{value}'"
            ))),
        }
    }
}

impl Display for VerificationPurpose {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Counter, lock and active code for one (user, purpose) pair.
///
/// Persistence adapters rebuild this verbatim, including states that violate
/// `locked => locked_at.is_some()`; the lock policy repairs those on read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationState {
    /// Current one-time code, `None` when unset or consumed.
    pub code: Option<String>,
    /// When the current code was generated.
    pub code_issued_at: Option<DateTime<Utc>>,
    /// Sends or failed confirmations since the last reset.
    pub attempt_count: u32,
    /// Whether the subject is locked out of the guarded action.
    pub locked: bool,
    /// When the lock began.
    pub locked_at: Option<DateTime<Utc>>,
}

impl VerificationState {
    /// Returns a copy with a freshly issued code attached.
    #[must_use]
    pub fn with_code(mut self, code: &VerificationCode, issued_at: DateTime<Utc>) -> Self {
        self.code = Some(code.as_str().to_owned());
        self.code_issued_at = Some(issued_at);
        self
    }

    /// Returns whether the state satisfies both data model invariants.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let lock_ok = !self.locked || self.locked_at.is_some();
        let code_ok = self.code.is_none() || self.code_issued_at.is_some();
        lock_ok && code_ok
    }
}

/// A six digit numeric one-time code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VerificationCode(String);

impl VerificationCode {
    /// Builds a code from decimal digit values in `0..=9`.
    pub fn from_digits(digits: &[u8]) -> AppResult<Self> {
        if digits.len() != VERIFICATION_CODE_LENGTH {
            return Err(AppError::Validation(format!(
                "verification code must have {VERIFICATION_CODE_LENGTH} digits"
            )));
        }

        digits
            .iter()
            .map(|digit| {
                char::from_digit(u32::from(*digit), 10).ok_or_else(|| {
                    AppError::Validation(format!("'{digit}' is not a decimal digit"))
                })
            })
            .collect::<AppResult<String>>()
            .map(Self)
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for VerificationCode {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Why a submitted code was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeRejection {
    /// No code has been issued, or it was already consumed.
    NoActiveCode,
    /// The code is older than its time-to-live.
    Expired,
    /// The code does not match.
    Mismatch,
}

/// Checks a submitted code against the active one.
///
/// Precedence is no active code, then expiry, then mismatch.
pub fn verify_code(
    state: &VerificationState,
    submitted: &str,
    now: DateTime<Utc>,
    ttl: TimeDelta,
) -> Result<(), CodeRejection> {
    let (Some(code), Some(issued_at)) = (state.code.as_deref(), state.code_issued_at) else {
        return Err(CodeRejection::NoActiveCode);
    };

    if now - issued_at > ttl {
        return Err(CodeRejection::Expired);
    }

    if code != submitted.trim() {
        return Err(CodeRejection::Mismatch);
    }

    Ok(())
}

/// Default code time-to-live.
#[must_use]
pub fn verification_code_ttl() -> TimeDelta {
    TimeDelta::minutes(VERIFICATION_CODE_TTL_MINUTES)
}
