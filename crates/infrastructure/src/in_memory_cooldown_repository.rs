use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oasreg_application::CooldownRepository;
use oasreg_core::AppResult;
use oasreg_domain::{CooldownRecord, RequestType, UserId};
use tokio::sync::RwLock;

/// In-memory adapter for cancellation cooldowns.
#[derive(Default)]
pub struct InMemoryCooldownRepository {
    records: RwLock<HashMap<(UserId, RequestType), CooldownRecord>>,
}

impl InMemoryCooldownRepository {
    /// Creates an empty cooldown store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CooldownRepository for InMemoryCooldownRepository {
    async fn find(
        &self,
        user_id: UserId,
        request_type: RequestType,
    ) -> AppResult<Option<CooldownRecord>> {
        Ok(self
            .records
            .read()
            .await
            .get(&(user_id, request_type))
            .copied())
    }

    async fn upsert(
        &self,
        user_id: UserId,
        request_type: RequestType,
        record: CooldownRecord,
    ) -> AppResult<()> {
        self.records
            .write()
            .await
            .insert((user_id, request_type), record);
        Ok(())
    }

    async fn remove(
        &self,
        user_id: UserId,
        request_type: RequestType,
        record: CooldownRecord,
    ) -> AppResult<bool> {
        let mut records = self.records.write().await;
        if records.get(&(user_id, request_type)) != Some(&record) {
            return Ok(false);
        }

        records.remove(&(user_id, request_type));
        Ok(true)
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| record.deleted_at > cutoff);
        Ok(u64::try_from(before - records.len()).unwrap_or(u64::MAX))
    }
}
