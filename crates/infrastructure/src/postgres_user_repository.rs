//! PostgreSQL-backed user repository.

use async_trait::async_trait;
use sqlx::PgPool;

use oasreg_application::{NewUser, UserRecord, UserRepository};
use oasreg_core::{AppError, AppResult};
use oasreg_domain::{EmailAddress, FamilyLevel, UserId};

use crate::database::database_error;

/// PostgreSQL implementation of the user repository port.
#[derive(Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, column_filter: &str, value: &str) -> AppResult<Option<UserRecord>> {
        let sql = format!(
            r#"
            SELECT id, email, nick_name, password_hash, email_verified, pending_email, family_level
            FROM users
            WHERE {column_filter} = $1
            "#
        );

        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| database_error("failed to find user", error))?;

        row.map(UserRecord::try_from).transpose()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: uuid::Uuid,
    email: String,
    nick_name: String,
    password_hash: String,
    email_verified: bool,
    pending_email: Option<String>,
    family_level: String,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UserId::from_uuid(row.id),
            email: EmailAddress::new(row.email)?,
            nick_name: row.nick_name,
            password_hash: row.password_hash,
            email_verified: row.email_verified,
            pending_email: row.pending_email.map(EmailAddress::new).transpose()?,
            family_level: FamilyLevel::parse(&row.family_level)?,
        })
    }
}

fn ensure_updated(rows_affected: u64, user_id: UserId) -> AppResult<()> {
    if rows_affected == 0 {
        return Err(AppError::NotFound(format!("user '{user_id}' not found")));
    }

    Ok(())
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, nick_name, password_hash, email_verified, pending_email, family_level
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| database_error("failed to find user by id", error))?;

        row.map(UserRecord::try_from).transpose()
    }

    async fn find_by_email(&self, email: &EmailAddress) -> AppResult<Option<UserRecord>> {
        self.find_one("email", email.as_str()).await
    }

    async fn find_by_pending_email(&self, email: &EmailAddress) -> AppResult<Option<UserRecord>> {
        self.find_one("pending_email", email.as_str()).await
    }

    async fn create(&self, user: &NewUser) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, nick_name, password_hash)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(user.email.as_str())
        .bind(user.nick_name.as_str())
        .bind(user.password_hash.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| database_error("failed to create user", error))?;

        Ok(())
    }

    async fn mark_email_verified(&self, user_id: UserId) -> AppResult<()> {
        let result = sqlx::query("UPDATE users SET email_verified = TRUE WHERE id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|error| database_error("failed to mark email verified", error))?;

        ensure_updated(result.rows_affected(), user_id)
    }

    async fn set_pending_email(
        &self,
        user_id: UserId,
        pending_email: Option<&EmailAddress>,
    ) -> AppResult<()> {
        let result = sqlx::query("UPDATE users SET pending_email = $2 WHERE id = $1")
            .bind(user_id.as_uuid())
            .bind(pending_email.map(EmailAddress::as_str))
            .execute(&self.pool)
            .await
            .map_err(|error| database_error("failed to set pending email", error))?;

        ensure_updated(result.rows_affected(), user_id)
    }

    async fn commit_email_change(
        &self,
        user_id: UserId,
        new_email: &EmailAddress,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = $2,
                pending_email = NULL,
                email_verified = TRUE
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(new_email.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| database_error("failed to commit email change", error))?;

        ensure_updated(result.rows_affected(), user_id)
    }
}
