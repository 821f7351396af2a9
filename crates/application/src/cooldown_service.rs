use std::sync::Arc;

use oasreg_core::AppResult;
use oasreg_domain::{CooldownPolicy, CooldownRecord, CooldownStatus, RequestType, UserId};

use crate::{Clock, CooldownRepository};

/// Application service for per-(user, request type) cancellation cooldowns.
#[derive(Clone)]
pub struct CooldownService {
    repository: Arc<dyn CooldownRepository>,
    clock: Arc<dyn Clock>,
    policy: CooldownPolicy,
}

impl CooldownService {
    /// Creates a new cooldown service.
    #[must_use]
    pub fn new(
        repository: Arc<dyn CooldownRepository>,
        clock: Arc<dyn Clock>,
        policy: CooldownPolicy,
    ) -> Self {
        Self {
            repository,
            clock,
            policy,
        }
    }

    /// Returns the cooldown status, deleting an elapsed record.
    pub async fn check(
        &self,
        user_id: UserId,
        request_type: RequestType,
    ) -> AppResult<CooldownStatus> {
        let Some(record) = self.repository.find(user_id, request_type).await? else {
            return Ok(CooldownStatus::Clear);
        };

        let status = self.policy.evaluate(&record, self.clock.now());
        if status == CooldownStatus::Clear {
            self.repository.remove(user_id, request_type, record).await?;
        }

        Ok(status)
    }

    /// Starts or restarts the cooldown from now.
    pub async fn set(&self, user_id: UserId, request_type: RequestType) -> AppResult<()> {
        let record = CooldownRecord {
            deleted_at: self.clock.now(),
        };
        self.repository.upsert(user_id, request_type, record).await?;
        tracing::debug!(%user_id, request_type = %request_type, "cooldown started");
        Ok(())
    }

    /// Deletes every elapsed record. Returns how many were removed.
    pub async fn purge_expired(&self) -> AppResult<u64> {
        let cutoff = self.policy.cutoff(self.clock.now());
        self.repository.purge_before(cutoff).await
    }
}
