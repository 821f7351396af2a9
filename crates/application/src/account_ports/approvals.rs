use async_trait::async_trait;
use oasreg_core::AppResult;
use oasreg_domain::{ApprovalRequest, ApprovalRequestId, RequestType, UserId};

/// Repository port for family approval requests.
#[async_trait]
pub trait ApprovalRepository: Send + Sync {
    /// Inserts a new request.
    async fn insert(&self, request: &ApprovalRequest) -> AppResult<()>;

    /// Finds a request by identifier.
    async fn find_by_id(&self, id: ApprovalRequestId) -> AppResult<Option<ApprovalRequest>>;

    /// Finds the requestee's pending request of one type.
    async fn find_pending(
        &self,
        requestee: UserId,
        request_type: RequestType,
    ) -> AppResult<Option<ApprovalRequest>>;

    /// Lists pending requests addressed to an approver, oldest first.
    async fn list_pending_for_approver(&self, approver: UserId)
    -> AppResult<Vec<ApprovalRequest>>;

    /// Deletes a request. Returns whether it existed.
    async fn delete(&self, id: ApprovalRequestId) -> AppResult<bool>;

    /// Saves a decided request if it is still pending in storage.
    ///
    /// Fails with `AppError::Conflict` when it was decided or deleted meanwhile.
    async fn save_resolution(&self, request: &ApprovalRequest) -> AppResult<()>;
}
