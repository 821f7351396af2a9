//! PostgreSQL-backed cancellation cooldowns.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use oasreg_application::CooldownRepository;
use oasreg_core::AppResult;
use oasreg_domain::{CooldownRecord, RequestType, UserId};

use crate::database::database_error;

/// PostgreSQL implementation of the cooldown repository port.
#[derive(Clone)]
pub struct PostgresCooldownRepository {
    pool: PgPool,
}

impl PostgresCooldownRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CooldownRepository for PostgresCooldownRepository {
    async fn find(
        &self,
        user_id: UserId,
        request_type: RequestType,
    ) -> AppResult<Option<CooldownRecord>> {
        let deleted_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            SELECT deleted_at
            FROM cooldowns
            WHERE user_id = $1 AND request_type = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(request_type.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| database_error("failed to load cooldown", error))?;

        Ok(deleted_at.map(|deleted_at| CooldownRecord { deleted_at }))
    }

    async fn upsert(
        &self,
        user_id: UserId,
        request_type: RequestType,
        record: CooldownRecord,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cooldowns (user_id, request_type, deleted_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, request_type) DO UPDATE
            SET deleted_at = EXCLUDED.deleted_at
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(request_type.as_str())
        .bind(record.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|error| database_error("failed to store cooldown", error))?;

        Ok(())
    }

    async fn remove(
        &self,
        user_id: UserId,
        request_type: RequestType,
        record: CooldownRecord,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM cooldowns
            WHERE user_id = $1 AND request_type = $2 AND deleted_at = $3
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(request_type.as_str())
        .bind(record.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|error| database_error("failed to remove cooldown", error))?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM cooldowns WHERE deleted_at <= $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|error| database_error("failed to purge expired cooldowns", error))?;

        Ok(result.rows_affected())
    }
}
