use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oasreg_core::AppResult;
use oasreg_domain::{
    AccountLockState, CooldownRecord, RequestType, UserId, VerificationPurpose, VerificationState,
};

use super::Revisioned;

/// Repository port for per-(user, purpose) verification state.
#[async_trait]
pub trait VerificationStateRepository: Send + Sync {
    /// Loads the state. Absent rows load as the default state at revision 0.
    async fn load(
        &self,
        user_id: UserId,
        purpose: VerificationPurpose,
    ) -> AppResult<Revisioned<VerificationState>>;

    /// Writes the state if the stored revision still equals `expected_revision`.
    ///
    /// Returns the new revision, or `AppError::Conflict` on a stale revision.
    async fn store(
        &self,
        user_id: UserId,
        purpose: VerificationPurpose,
        state: &VerificationState,
        expected_revision: i64,
    ) -> AppResult<i64>;
}

/// Repository port for per-user login lock state.
#[async_trait]
pub trait AccountLockRepository: Send + Sync {
    /// Loads the lock state. Absent rows load as active at revision 0.
    async fn load(&self, user_id: UserId) -> AppResult<Revisioned<AccountLockState>>;

    /// Writes the lock state with the same revision rules as verification state.
    async fn store(
        &self,
        user_id: UserId,
        state: &AccountLockState,
        expected_revision: i64,
    ) -> AppResult<i64>;
}

/// Repository port for cancellation cooldowns.
#[async_trait]
pub trait CooldownRepository: Send + Sync {
    /// Finds the cooldown record for one (user, request type) pair.
    async fn find(
        &self,
        user_id: UserId,
        request_type: RequestType,
    ) -> AppResult<Option<CooldownRecord>>;

    /// Inserts or overwrites the record.
    async fn upsert(
        &self,
        user_id: UserId,
        request_type: RequestType,
        record: CooldownRecord,
    ) -> AppResult<()>;

    /// Deletes the record only if it still equals `record`.
    ///
    /// Returns whether a row was removed.
    async fn remove(
        &self,
        user_id: UserId,
        request_type: RequestType,
        record: CooldownRecord,
    ) -> AppResult<bool>;

    /// Deletes every record whose `deleted_at` is at or before `cutoff`.
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;
}
