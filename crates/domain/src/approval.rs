//! Family group approval requests.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use oasreg_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{RequestType, UserId};

/// Unique identifier for an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApprovalRequestId(Uuid);

impl ApprovalRequestId {
    /// Creates a random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ApprovalRequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ApprovalRequestId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Processing state of an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Waiting for the approver.
    Pending,
    /// Accepted by the approver.
    Approved,
    /// Refused by the approver.
    Rejected,
    /// Withdrawn by the requestee.
    Canceled,
}

impl ApprovalStatus {
    /// Returns the storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Canceled => "canceled",
        }
    }

    /// Parses a storage string.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "canceled" => Ok(Self::Canceled),
            _ => Err(AppError::Validation(format!(
                "unknown approval status '{value}'"
            ))),
        }
    }
}

/// A request from a family member that a master must approve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Request identifier.
    pub id: ApprovalRequestId,
    /// User asking for approval.
    pub requestee: UserId,
    /// Master user who decides.
    pub approver: UserId,
    /// What is being requested.
    pub request_type: RequestType,
    /// Free-form request details.
    pub details: serde_json::Value,
    /// Current status.
    pub status: ApprovalStatus,
    /// Creation time.
    pub requested_at: DateTime<Utc>,
    /// When the approver decided.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Approver's reason, required on rejection.
    pub reason: String,
}

impl ApprovalRequest {
    /// Creates a pending request.
    #[must_use]
    pub fn pending(
        requestee: UserId,
        approver: UserId,
        request_type: RequestType,
        details: serde_json::Value,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ApprovalRequestId::new(),
            requestee,
            approver,
            request_type,
            details,
            status: ApprovalStatus::Pending,
            requested_at,
            resolved_at: None,
            reason: String::new(),
        }
    }

    /// Applies the approver's decision.
    pub fn resolve(
        mut self,
        acting_user: UserId,
        status: ApprovalStatus,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<Self> {
        if acting_user != self.approver {
            return Err(AppError::Forbidden(
                "only the designated approver can decide this request".to_owned(),
            ));
        }

        if self.status != ApprovalStatus::Pending {
            return Err(AppError::Validation(format!(
                "request is already {} and can no longer change",
                self.status.as_str()
            )));
        }

        if !matches!(status, ApprovalStatus::Approved | ApprovalStatus::Rejected) {
            return Err(AppError::Validation(
                "status can only change to approved or rejected".to_owned(),
            ));
        }

        let reason = reason.map(str::trim).unwrap_or_default();
        if status == ApprovalStatus::Rejected && reason.is_empty() {
            return Err(AppError::Validation(
                "a reason is required when rejecting a request".to_owned(),
            ));
        }

        self.status = status;
        self.reason = reason.to_owned();
        self.resolved_at = Some(now);
        Ok(self)
    }
}
