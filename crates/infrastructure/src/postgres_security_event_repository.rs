use async_trait::async_trait;
use sqlx::PgPool;

use oasreg_application::{SecurityEvent, SecurityEventRepository};
use oasreg_core::AppResult;

use crate::database::database_error;

/// PostgreSQL-backed repository for diagnostic security events.
#[derive(Clone)]
pub struct PostgresSecurityEventRepository {
    pool: PgPool,
}

impl PostgresSecurityEventRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SecurityEventRepository for PostgresSecurityEventRepository {
    async fn append_event(&self, event: SecurityEvent) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO security_events (user_id, event_type, level, message)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(event.user_id.map(|user_id| user_id.as_uuid()))
        .bind(event.event_type.as_str())
        .bind(event.level.as_str())
        .bind(event.message)
        .execute(&self.pool)
        .await
        .map_err(|error| database_error("failed to append security event", error))?;

        Ok(())
    }
}
