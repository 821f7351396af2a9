use std::env;

use chrono::{FixedOffset, TimeDelta};
use oasreg_application::{DEFAULT_QR_UTC_OFFSET_SECONDS, GuardSettings};
use oasreg_core::{AppError, AppResult};
use oasreg_domain::{
    CooldownPolicy, DEFAULT_COOLDOWN_MINUTES, DEFAULT_LOCK_MINUTES, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_SUSPEND_THRESHOLD, DEFAULT_UNLOCK_DELAY_MINUTES, LockPolicy, LoginLockout,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub redis_url: Option<String>,
    pub sweep_interval_seconds: u64,
    pub cooldown_minutes: i64,
    pub email_lock_max_attempts: u32,
    pub email_lock_minutes: i64,
    pub login_lock_threshold: u32,
    pub login_unlock_minutes: i64,
    pub qr_utc_offset_minutes: i32,
}

impl WorkerConfig {
    pub fn load() -> AppResult<Self> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");
        let mut config = Self::from_lookup(|name| env::var(name).ok())?;
        config.migrate_only = migrate_only;
        Ok(config)
    }

    fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| AppError::Validation("DATABASE_URL is required".to_owned()))?;
        let redis_url = lookup("REDIS_URL")
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        let config = Self {
            migrate_only: false,
            database_url,
            redis_url,
            sweep_interval_seconds: parse_or(&lookup, "SWEEP_INTERVAL_SECONDS", 60)?,
            cooldown_minutes: parse_or(&lookup, "COOLDOWN_MINUTES", DEFAULT_COOLDOWN_MINUTES)?,
            email_lock_max_attempts: parse_or(
                &lookup,
                "EMAIL_LOCK_MAX_ATTEMPTS",
                DEFAULT_MAX_ATTEMPTS,
            )?,
            email_lock_minutes: parse_or(&lookup, "EMAIL_LOCK_MINUTES", DEFAULT_LOCK_MINUTES)?,
            login_lock_threshold: parse_or(
                &lookup,
                "LOGIN_LOCK_THRESHOLD",
                DEFAULT_SUSPEND_THRESHOLD,
            )?,
            login_unlock_minutes: parse_or(
                &lookup,
                "LOGIN_UNLOCK_MINUTES",
                DEFAULT_UNLOCK_DELAY_MINUTES,
            )?,
            qr_utc_offset_minutes: parse_or(
                &lookup,
                "QR_UTC_OFFSET_MINUTES",
                DEFAULT_QR_UTC_OFFSET_SECONDS / 60,
            )?,
        };

        if config.sweep_interval_seconds == 0 {
            return Err(AppError::Validation(
                "SWEEP_INTERVAL_SECONDS must be greater than zero".to_owned(),
            ));
        }

        for (name, value) in [
            ("COOLDOWN_MINUTES", config.cooldown_minutes),
            ("EMAIL_LOCK_MAX_ATTEMPTS", i64::from(config.email_lock_max_attempts)),
            ("EMAIL_LOCK_MINUTES", config.email_lock_minutes),
            ("LOGIN_LOCK_THRESHOLD", i64::from(config.login_lock_threshold)),
            ("LOGIN_UNLOCK_MINUTES", config.login_unlock_minutes),
        ] {
            if value <= 0 {
                return Err(AppError::Validation(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        Ok(config)
    }

    pub fn guard_settings(&self) -> AppResult<GuardSettings> {
        let qr_time_offset = FixedOffset::east_opt(self.qr_utc_offset_minutes.saturating_mul(60))
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "QR_UTC_OFFSET_MINUTES out of range: {}",
                    self.qr_utc_offset_minutes
                ))
            })?;

        Ok(GuardSettings {
            email_lock: LockPolicy::new(
                self.email_lock_max_attempts,
                TimeDelta::minutes(self.email_lock_minutes),
            ),
            login_lockout: LoginLockout::new(
                self.login_lock_threshold,
                TimeDelta::minutes(self.login_unlock_minutes),
            ),
            cooldown: CooldownPolicy::new(TimeDelta::minutes(self.cooldown_minutes)),
            qr_time_offset,
            ..GuardSettings::default()
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> AppResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) => value.trim().parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
