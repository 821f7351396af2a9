//! Family approval requests guarded by cancellation cooldowns.

use std::sync::Arc;

use oasreg_core::{AppError, AppResult};
use oasreg_domain::{
    ApprovalRequest, ApprovalRequestId, ApprovalStatus, CooldownStatus, EmailAddress,
    FamilyLevel, RequestType, UserId,
};

use crate::guard_outcome::ceil_seconds;
use crate::{ApprovalRepository, Clock, CooldownService, UserRepository};

/// Result of submitting an approval request.
#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalSubmission {
    /// The request was created and awaits the approver.
    Submitted(ApprovalRequest),
    /// A recent cancellation blocks new requests of this type.
    CoolingDown {
        /// Whole seconds until requests are accepted again, rounded up.
        remaining_seconds: i64,
    },
}

/// Application service for family approval requests.
#[derive(Clone)]
pub struct ApprovalService {
    approval_repository: Arc<dyn ApprovalRepository>,
    user_repository: Arc<dyn UserRepository>,
    cooldown_service: CooldownService,
    clock: Arc<dyn Clock>,
}

impl ApprovalService {
    /// Creates a new approval service.
    #[must_use]
    pub fn new(
        approval_repository: Arc<dyn ApprovalRepository>,
        user_repository: Arc<dyn UserRepository>,
        cooldown_service: CooldownService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            approval_repository,
            user_repository,
            cooldown_service,
            clock,
        }
    }

    /// Submits a request to the master identified by `approver_email`.
    pub async fn submit(
        &self,
        requestee: UserId,
        approver_email: &str,
        request_type: RequestType,
        details: serde_json::Value,
    ) -> AppResult<ApprovalSubmission> {
        if let CooldownStatus::StillCooling { remaining } =
            self.cooldown_service.check(requestee, request_type).await?
        {
            return Ok(ApprovalSubmission::CoolingDown {
                remaining_seconds: ceil_seconds(remaining),
            });
        }

        let approver_email = EmailAddress::new(approver_email)?;
        let approver = self
            .user_repository
            .find_by_email(&approver_email)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("no user with email '{approver_email}'"))
            })?;

        if approver.id == requestee {
            return Err(AppError::Validation(
                "a request cannot be addressed to yourself".to_owned(),
            ));
        }

        if approver.family_level != FamilyLevel::Master {
            return Err(AppError::Forbidden(
                "approver must be the family master".to_owned(),
            ));
        }

        if self
            .approval_repository
            .find_pending(requestee, request_type)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "a pending {} already exists",
                request_type.label()
            )));
        }

        let request = ApprovalRequest::pending(
            requestee,
            approver.id,
            request_type,
            details,
            self.clock.now(),
        );
        self.approval_repository.insert(&request).await?;
        tracing::info!(
            requestee = %requestee,
            approver = %approver.id,
            request_type = %request_type,
            "approval request submitted"
        );

        Ok(ApprovalSubmission::Submitted(request))
    }

    /// Withdraws the requestee's pending request and starts the cooldown.
    pub async fn cancel(&self, requestee: UserId, request_type: RequestType) -> AppResult<()> {
        let request = self
            .approval_repository
            .find_pending(requestee, request_type)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("no pending {} to cancel", request_type.label()))
            })?;

        if !self.approval_repository.delete(request.id).await? {
            return Err(AppError::NotFound(format!(
                "no pending {} to cancel",
                request_type.label()
            )));
        }

        self.cooldown_service.set(requestee, request_type).await?;
        tracing::info!(requestee = %requestee, request_type = %request_type, "approval request cancelled");
        Ok(())
    }

    /// Lists pending requests addressed to `approver`.
    pub async fn pending_for(&self, approver: UserId) -> AppResult<Vec<ApprovalRequest>> {
        self.approval_repository
            .list_pending_for_approver(approver)
            .await
    }

    /// Approves or rejects a pending request.
    pub async fn resolve(
        &self,
        acting_user: UserId,
        id: ApprovalRequestId,
        status: ApprovalStatus,
        reason: Option<&str>,
    ) -> AppResult<ApprovalRequest> {
        let request = self
            .approval_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("approval request '{id}' not found")))?;

        let resolved = request.resolve(acting_user, status, reason, self.clock.now())?;
        self.approval_repository.save_resolution(&resolved).await?;
        tracing::info!(request_id = %id, status = resolved.status.as_str(), "approval request resolved");

        Ok(resolved)
    }
}
