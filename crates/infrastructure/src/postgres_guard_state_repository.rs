//! PostgreSQL-backed verification and account lock state with revision checks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use oasreg_application::{AccountLockRepository, Revisioned, VerificationStateRepository};
use oasreg_core::{AppError, AppResult};
use oasreg_domain::{AccountLockState, UserId, VerificationPurpose, VerificationState};

use crate::database::{counter_from_db, counter_to_db, database_error};

/// PostgreSQL implementation of the verification state and account lock ports.
#[derive(Clone)]
pub struct PostgresGuardStateRepository {
    pool: PgPool,
}

impl PostgresGuardStateRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VerificationStateRow {
    code: Option<String>,
    code_issued_at: Option<DateTime<Utc>>,
    attempt_count: i32,
    locked: bool,
    locked_at: Option<DateTime<Utc>>,
    revision: i64,
}

impl TryFrom<VerificationStateRow> for Revisioned<VerificationState> {
    type Error = AppError;

    fn try_from(row: VerificationStateRow) -> Result<Self, Self::Error> {
        Ok(Revisioned::new(
            VerificationState {
                code: row.code,
                code_issued_at: row.code_issued_at,
                attempt_count: counter_from_db("attempt_count", row.attempt_count)?,
                locked: row.locked,
                locked_at: row.locked_at,
            },
            row.revision,
        ))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AccountLockRow {
    active: bool,
    fail_count: i32,
    last_fail_at: Option<DateTime<Utc>>,
    revision: i64,
}

impl TryFrom<AccountLockRow> for Revisioned<AccountLockState> {
    type Error = AppError;

    fn try_from(row: AccountLockRow) -> Result<Self, Self::Error> {
        Ok(Revisioned::new(
            AccountLockState {
                active: row.active,
                fail_count: counter_from_db("fail_count", row.fail_count)?,
                last_fail_at: row.last_fail_at,
            },
            row.revision,
        ))
    }
}

fn stale_revision(subject: &str, user_id: UserId, expected_revision: i64) -> AppError {
    AppError::Conflict(format!(
        "{subject} for user '{user_id}' changed since revision {expected_revision}"
    ))
}

#[async_trait]
impl VerificationStateRepository for PostgresGuardStateRepository {
    async fn load(
        &self,
        user_id: UserId,
        purpose: VerificationPurpose,
    ) -> AppResult<Revisioned<VerificationState>> {
        let row = sqlx::query_as::<_, VerificationStateRow>(
            r#"
            SELECT code, code_issued_at, attempt_count, locked, locked_at, revision
            FROM verification_states
            WHERE user_id = $1 AND purpose = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(purpose.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| database_error("failed to load verification state", error))?;

        row.map_or_else(|| Ok(Revisioned::absent()), Revisioned::try_from)
    }

    async fn store(
        &self,
        user_id: UserId,
        purpose: VerificationPurpose,
        state: &VerificationState,
        expected_revision: i64,
    ) -> AppResult<i64> {
        let attempt_count = counter_to_db("attempt_count", state.attempt_count)?;

        let query = if expected_revision == 0 {
            sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO verification_states (
                    user_id, purpose, code, code_issued_at, attempt_count, locked, locked_at,
                    revision
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8 + 1)
                ON CONFLICT (user_id, purpose) DO NOTHING
                RETURNING revision
                "#,
            )
        } else {
            sqlx::query_scalar::<_, i64>(
                r#"
                UPDATE verification_states
                SET code = $3,
                    code_issued_at = $4,
                    attempt_count = $5,
                    locked = $6,
                    locked_at = $7,
                    revision = revision + 1
                WHERE user_id = $1 AND purpose = $2 AND revision = $8
                RETURNING revision
                "#,
            )
        };

        let revision = query
            .bind(user_id.as_uuid())
            .bind(purpose.as_str())
            .bind(state.code.as_deref())
            .bind(state.code_issued_at)
            .bind(attempt_count)
            .bind(state.locked)
            .bind(state.locked_at)
            .bind(expected_revision)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| database_error("failed to store verification state", error))?;

        revision.ok_or_else(|| {
            stale_revision(
                &format!("{} verification state", purpose.as_str()),
                user_id,
                expected_revision,
            )
        })
    }
}

#[async_trait]
impl AccountLockRepository for PostgresGuardStateRepository {
    async fn load(&self, user_id: UserId) -> AppResult<Revisioned<AccountLockState>> {
        let row = sqlx::query_as::<_, AccountLockRow>(
            r#"
            SELECT active, fail_count, last_fail_at, revision
            FROM account_locks
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| database_error("failed to load account lock", error))?;

        row.map_or_else(|| Ok(Revisioned::absent()), Revisioned::try_from)
    }

    async fn store(
        &self,
        user_id: UserId,
        state: &AccountLockState,
        expected_revision: i64,
    ) -> AppResult<i64> {
        let fail_count = counter_to_db("fail_count", state.fail_count)?;

        let query = if expected_revision == 0 {
            sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO account_locks (user_id, active, fail_count, last_fail_at, revision)
                VALUES ($1, $2, $3, $4, $5 + 1)
                ON CONFLICT (user_id) DO NOTHING
                RETURNING revision
                "#,
            )
        } else {
            sqlx::query_scalar::<_, i64>(
                r#"
                UPDATE account_locks
                SET active = $2,
                    fail_count = $3,
                    last_fail_at = $4,
                    revision = revision + 1
                WHERE user_id = $1 AND revision = $5
                RETURNING revision
                "#,
            )
        };

        let revision = query
            .bind(user_id.as_uuid())
            .bind(state.active)
            .bind(fail_count)
            .bind(state.last_fail_at)
            .bind(expected_revision)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| database_error("failed to store account lock", error))?;

        revision.ok_or_else(|| stale_revision("account lock", user_id, expected_revision))
    }
}
