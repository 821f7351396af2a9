//! PostgreSQL-backed family approval requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use oasreg_application::ApprovalRepository;
use oasreg_core::{AppError, AppResult};
use oasreg_domain::{
    ApprovalRequest, ApprovalRequestId, ApprovalStatus, RequestType, UserId,
};

use crate::database::database_error;

/// PostgreSQL implementation of the approval repository port.
#[derive(Clone)]
pub struct PostgresApprovalRepository {
    pool: PgPool,
}

impl PostgresApprovalRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ApprovalRow {
    id: uuid::Uuid,
    requestee_id: uuid::Uuid,
    approver_id: uuid::Uuid,
    request_type: String,
    details: serde_json::Value,
    status: String,
    requested_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
    reason: String,
}

impl TryFrom<ApprovalRow> for ApprovalRequest {
    type Error = AppError;

    fn try_from(row: ApprovalRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ApprovalRequestId::from_uuid(row.id),
            requestee: UserId::from_uuid(row.requestee_id),
            approver: UserId::from_uuid(row.approver_id),
            request_type: RequestType::parse(&row.request_type)?,
            details: row.details,
            status: ApprovalStatus::parse(&row.status)?,
            requested_at: row.requested_at,
            resolved_at: row.resolved_at,
            reason: row.reason,
        })
    }
}

#[async_trait]
impl ApprovalRepository for PostgresApprovalRepository {
    async fn insert(&self, request: &ApprovalRequest) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO approval_requests (
                id, requestee_id, approver_id, request_type, details, status, requested_at,
                resolved_at, reason
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(request.id.as_uuid())
        .bind(request.requestee.as_uuid())
        .bind(request.approver.as_uuid())
        .bind(request.request_type.as_str())
        .bind(&request.details)
        .bind(request.status.as_str())
        .bind(request.requested_at)
        .bind(request.resolved_at)
        .bind(request.reason.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| database_error("failed to insert approval request", error))?;

        Ok(())
    }

    async fn find_by_id(&self, id: ApprovalRequestId) -> AppResult<Option<ApprovalRequest>> {
        let row = sqlx::query_as::<_, ApprovalRow>(
            r#"
            SELECT id, requestee_id, approver_id, request_type, details, status, requested_at,
                   resolved_at, reason
            FROM approval_requests
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| database_error("failed to find approval request", error))?;

        row.map(ApprovalRequest::try_from).transpose()
    }

    async fn find_pending(
        &self,
        requestee: UserId,
        request_type: RequestType,
    ) -> AppResult<Option<ApprovalRequest>> {
        let row = sqlx::query_as::<_, ApprovalRow>(
            r#"
            SELECT id, requestee_id, approver_id, request_type, details, status, requested_at,
                   resolved_at, reason
            FROM approval_requests
            WHERE requestee_id = $1 AND request_type = $2 AND status = 'pending'
            "#,
        )
        .bind(requestee.as_uuid())
        .bind(request_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| database_error("failed to find pending approval request", error))?;

        row.map(ApprovalRequest::try_from).transpose()
    }

    async fn list_pending_for_approver(
        &self,
        approver: UserId,
    ) -> AppResult<Vec<ApprovalRequest>> {
        let rows = sqlx::query_as::<_, ApprovalRow>(
            r#"
            SELECT id, requestee_id, approver_id, request_type, details, status, requested_at,
                   resolved_at, reason
            FROM approval_requests
            WHERE approver_id = $1 AND status = 'pending'
            ORDER BY requested_at ASC, id ASC
            "#,
        )
        .bind(approver.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| database_error("failed to list pending approval requests", error))?;

        rows.into_iter().map(ApprovalRequest::try_from).collect()
    }

    async fn delete(&self, id: ApprovalRequestId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM approval_requests WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|error| database_error("failed to delete approval request", error))?;

        Ok(result.rows_affected() > 0)
    }

    async fn save_resolution(&self, request: &ApprovalRequest) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE approval_requests
            SET status = $2,
                resolved_at = $3,
                reason = $4
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(request.id.as_uuid())
        .bind(request.status.as_str())
        .bind(request.resolved_at)
        .bind(request.reason.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| database_error("failed to save approval resolution", error))?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "approval request '{}' is no longer pending",
                request.id
            )));
        }

        Ok(())
    }
}
