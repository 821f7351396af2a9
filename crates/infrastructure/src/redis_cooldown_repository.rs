//! Redis-backed cancellation cooldowns.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use oasreg_application::{Clock, CooldownRepository};
use oasreg_core::{AppError, AppResult};
use oasreg_domain::{CooldownRecord, RequestType, UserId};
use redis::Script;
use redis::aio::MultiplexedConnection;

const COMPARE_AND_DELETE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// Redis implementation of the cooldown repository port.
///
/// Records are stored as microsecond timestamps and expire on their own once
/// the retention window has passed.
#[derive(Clone)]
pub struct RedisCooldownRepository {
    client: redis::Client,
    key_prefix: String,
    retention_seconds: i64,
    clock: Arc<dyn Clock>,
}

impl RedisCooldownRepository {
    /// Creates a repository that keeps each record for `retention` as seen by `clock`.
    #[must_use]
    pub fn new(
        client: redis::Client,
        key_prefix: impl Into<String>,
        retention: TimeDelta,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
            retention_seconds: retention.num_seconds().max(1),
            clock,
        }
    }

    fn key_for(&self, user_id: UserId, request_type: RequestType) -> String {
        format!("{}:{user_id}:{}", self.key_prefix, request_type.as_str())
    }

    async fn connection(&self) -> AppResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to connect to redis: {error}")))
    }

    /// Remaining retention of `record`, never below one second.
    fn expiry_seconds(&self, record: CooldownRecord) -> i64 {
        let age = self.clock.now() - record.deleted_at;
        (TimeDelta::seconds(self.retention_seconds) - age)
            .num_seconds()
            .max(1)
    }
}

fn decode_record(micros: i64) -> AppResult<CooldownRecord> {
    DateTime::from_timestamp_micros(micros)
        .map(|deleted_at| CooldownRecord { deleted_at })
        .ok_or_else(|| AppError::Internal(format!("invalid cooldown timestamp in redis: {micros}")))
}

#[async_trait]
impl CooldownRepository for RedisCooldownRepository {
    async fn find(
        &self,
        user_id: UserId,
        request_type: RequestType,
    ) -> AppResult<Option<CooldownRecord>> {
        let mut connection = self.connection().await?;
        let stored: Option<i64> = redis::cmd("GET")
            .arg(self.key_for(user_id, request_type))
            .query_async(&mut connection)
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to read cooldown: {error}")))?;

        stored.map(decode_record).transpose()
    }

    async fn upsert(
        &self,
        user_id: UserId,
        request_type: RequestType,
        record: CooldownRecord,
    ) -> AppResult<()> {
        let mut connection = self.connection().await?;
        redis::cmd("SET")
            .arg(self.key_for(user_id, request_type))
            .arg(record.deleted_at.timestamp_micros())
            .arg("EX")
            .arg(self.expiry_seconds(record))
            .query_async::<()>(&mut connection)
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to store cooldown: {error}")))
    }

    async fn remove(
        &self,
        user_id: UserId,
        request_type: RequestType,
        record: CooldownRecord,
    ) -> AppResult<bool> {
        let mut connection = self.connection().await?;
        let removed: i64 = Script::new(COMPARE_AND_DELETE_SCRIPT)
            .key(self.key_for(user_id, request_type))
            .arg(record.deleted_at.timestamp_micros())
            .invoke_async(&mut connection)
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to remove cooldown: {error}")))?;

        Ok(removed > 0)
    }

    async fn purge_before(&self, _cutoff: DateTime<Utc>) -> AppResult<u64> {
        // Cooldown keys expire automatically via TTL.
        Ok(0)
    }
}
