//! oasreg maintenance worker.
//!
//! Applies migrations and periodically purges elapsed cancellation cooldowns.

#![forbid(unsafe_code)]

mod worker_config;

use std::sync::Arc;
use std::time::Duration;

use oasreg_application::{Clock, CooldownRepository, CooldownService};
use oasreg_core::AppError;
use oasreg_infrastructure::{
    PostgresCooldownRepository, RedisCooldownRepository, SystemClock, connect_and_migrate,
};
use tracing::{debug, info, warn};

use crate::worker_config::{WorkerConfig, init_tracing};

const COOLDOWN_KEY_PREFIX: &str = "oasreg:cooldown";

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let settings = config.guard_settings()?;
    let pool = connect_and_migrate(config.database_url.as_str(), 5).await?;

    if config.migrate_only {
        info!("migrations applied");
        return Ok(());
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let cooldown_repository: Arc<dyn CooldownRepository> = match config.redis_url.as_deref() {
        Some(redis_url) => {
            let client = redis::Client::open(redis_url).map_err(|error| {
                AppError::Validation(format!("invalid REDIS_URL: {error}"))
            })?;
            Arc::new(RedisCooldownRepository::new(
                client,
                COOLDOWN_KEY_PREFIX,
                settings.cooldown.duration(),
                clock.clone(),
            ))
        }
        None => Arc::new(PostgresCooldownRepository::new(pool)),
    };
    let cooldown_service =
        CooldownService::new(cooldown_repository, clock, settings.cooldown);

    info!(
        cooldown_store = if config.redis_url.is_some() { "redis" } else { "postgres" },
        sweep_interval_seconds = config.sweep_interval_seconds,
        cooldown_minutes = config.cooldown_minutes,
        email_lock_max_attempts = settings.email_lock.max_attempts(),
        login_lock_threshold = settings.login_lockout.threshold(),
        "oasreg-worker started"
    );

    let mut sweep = tokio::time::interval(Duration::from_secs(config.sweep_interval_seconds));
    loop {
        sweep.tick().await;

        match cooldown_service.purge_expired().await {
            Ok(0) => debug!("no expired cooldowns"),
            Ok(purged) => info!(purged, "purged expired cooldowns"),
            Err(error) => warn!(error = %error, "cooldown sweep failed"),
        }
    }
}
