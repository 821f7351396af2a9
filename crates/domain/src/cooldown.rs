//! Cooldown applied after a pending request is cancelled.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, TimeDelta, Utc};
use oasreg_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Default cooldown length in minutes.
pub const DEFAULT_COOLDOWN_MINUTES: i64 = 5;

/// Kind of request an approval or cooldown applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    /// Email address change.
    EmailChange,
    /// Joining a family group.
    GroupJoin,
    /// Access to specific data.
    DataAccess,
}

impl RequestType {
    /// Returns the storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmailChange => "email_change",
            Self::GroupJoin => "group_join",
            Self::DataAccess => "data_access",
        }
    }

    /// Human-readable label used in denial messages.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::EmailChange => "email change request",
            Self::GroupJoin => "group join request",
            Self::DataAccess => "data access request",
        }
    }

    /// Parses a storage string.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "email_change" => Ok(Self::EmailChange),
            "group_join" => Ok(Self::GroupJoin),
            "data_access" => Ok(Self::DataAccess),
            _ => Err(AppError::Validation(format!(
                "unknown request type '{value}'"
            ))),
        }
    }
}

impl Display for RequestType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Marks when a guarded request was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownRecord {
    /// Cancellation time; the cooldown runs from here.
    pub deleted_at: DateTime<Utc>,
}

/// Cooldown status for a (user, request type) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownStatus {
    /// No cooldown applies.
    Clear,
    /// The cooldown is still running.
    StillCooling {
        /// Time left.
        remaining: TimeDelta,
    },
}

/// Cooldown length policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownPolicy {
    duration: TimeDelta,
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self::new(TimeDelta::minutes(DEFAULT_COOLDOWN_MINUTES))
    }
}

impl CooldownPolicy {
    /// Creates a policy with the given cooldown length.
    #[must_use]
    pub fn new(duration: TimeDelta) -> Self {
        Self { duration }
    }

    /// Cooldown length.
    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        self.duration
    }

    /// Evaluates a stored record. Elapsed records should be deleted by the caller.
    #[must_use]
    pub fn evaluate(&self, record: &CooldownRecord, now: DateTime<Utc>) -> CooldownStatus {
        let elapsed = now - record.deleted_at;
        if elapsed < self.duration {
            CooldownStatus::StillCooling {
                remaining: self.duration - elapsed,
            }
        } else {
            CooldownStatus::Clear
        }
    }

    /// Oldest `deleted_at` that is still cooling at `now`.
    #[must_use]
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.duration
    }
}
