//! Connection pool setup and sqlx error classification.

use oasreg_core::{AppError, AppResult};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Connects a pool and applies pending migrations.
pub async fn connect_and_migrate(database_url: &str, max_connections: u32) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect(database_url)
        .await
        .map_err(|error| AppError::Unavailable(format!("failed to connect to database: {error}")))?;

    run_migrations(&pool).await?;
    Ok(pool)
}

/// Applies pending migrations to an existing pool.
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    MIGRATOR
        .run(pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))
}

/// Maps a sqlx error, keeping unique violations and outages distinguishable.
pub(crate) fn database_error(context: &str, error: sqlx::Error) -> AppError {
    match &error {
        sqlx::Error::Database(database_error) if database_error.is_unique_violation() => {
            AppError::Conflict(format!("{context}: {database_error}"))
        }
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Tls(_) => AppError::Unavailable(format!("{context}: {error}")),
        _ => AppError::Internal(format!("{context}: {error}")),
    }
}

/// Converts a stored non-negative counter.
pub(crate) fn counter_from_db(column: &str, value: i32) -> AppResult<u32> {
    u32::try_from(value)
        .map_err(|error| AppError::Internal(format!("invalid {column} value {value}: {error}")))
}

/// Converts a counter for storage.
pub(crate) fn counter_to_db(column: &str, value: u32) -> AppResult<i32> {
    i32::try_from(value)
        .map_err(|error| AppError::Validation(format!("{column} out of range: {error}")))
}
