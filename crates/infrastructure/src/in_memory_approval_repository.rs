use std::collections::HashMap;

use async_trait::async_trait;
use oasreg_application::ApprovalRepository;
use oasreg_core::{AppError, AppResult};
use oasreg_domain::{ApprovalRequest, ApprovalRequestId, ApprovalStatus, RequestType, UserId};
use tokio::sync::RwLock;

/// In-memory adapter for family approval requests.
#[derive(Default)]
pub struct InMemoryApprovalRepository {
    requests: RwLock<HashMap<ApprovalRequestId, ApprovalRequest>>,
}

impl InMemoryApprovalRepository {
    /// Creates an empty approval store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_pending_for(request: &ApprovalRequest, requestee: UserId, request_type: RequestType) -> bool {
    request.requestee == requestee
        && request.request_type == request_type
        && request.status == ApprovalStatus::Pending
}

#[async_trait]
impl ApprovalRepository for InMemoryApprovalRepository {
    async fn insert(&self, request: &ApprovalRequest) -> AppResult<()> {
        let mut requests = self.requests.write().await;
        if requests
            .values()
            .any(|existing| is_pending_for(existing, request.requestee, request.request_type))
        {
            return Err(AppError::Conflict(format!(
                "a pending {} already exists",
                request.request_type.label()
            )));
        }

        requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: ApprovalRequestId) -> AppResult<Option<ApprovalRequest>> {
        Ok(self.requests.read().await.get(&id).cloned())
    }

    async fn find_pending(
        &self,
        requestee: UserId,
        request_type: RequestType,
    ) -> AppResult<Option<ApprovalRequest>> {
        Ok(self
            .requests
            .read()
            .await
            .values()
            .find(|request| is_pending_for(request, requestee, request_type))
            .cloned())
    }

    async fn list_pending_for_approver(
        &self,
        approver: UserId,
    ) -> AppResult<Vec<ApprovalRequest>> {
        let mut pending: Vec<ApprovalRequest> = self
            .requests
            .read()
            .await
            .values()
            .filter(|request| {
                request.approver == approver && request.status == ApprovalStatus::Pending
            })
            .cloned()
            .collect();
        pending.sort_by_key(|request| request.requested_at);
        Ok(pending)
    }

    async fn delete(&self, id: ApprovalRequestId) -> AppResult<bool> {
        Ok(self.requests.write().await.remove(&id).is_some())
    }

    async fn save_resolution(&self, request: &ApprovalRequest) -> AppResult<()> {
        let mut requests = self.requests.write().await;
        match requests.get_mut(&request.id) {
            Some(stored) if stored.status == ApprovalStatus::Pending => {
                *stored = request.clone();
                Ok(())
            }
            _ => Err(AppError::Conflict(format!(
                "approval request '{}' is no longer pending",
                request.id
            ))),
        }
    }
}
