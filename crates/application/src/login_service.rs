//! Password login guarded by account suspension.

use std::sync::Arc;

use oasreg_core::AppResult;
use oasreg_domain::{EmailAddress, FailureOutcome};

use crate::account_lock_gate::AccountLockGate;
use crate::guard_outcome::ceil_seconds;
use crate::{
    AccountLockRepository, Clock, GuardSettings, PasswordHasher, SecurityEventService,
    UserRecord, UserRepository,
};

/// Password hashed for unknown emails so both paths cost the same.
const TIMING_PAD_PASSWORD: &str = "timing-pad-password";

/// Result of a login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Credentials were accepted.
    Authenticated(UserRecord),
    /// Credentials were rejected.
    Failed {
        /// Failures left before suspension, `None` for unknown accounts.
        remaining_attempts: Option<u32>,
    },
    /// The account is suspended; credentials were not checked.
    Suspended {
        /// Whole seconds until reactivation, rounded up.
        remaining_seconds: i64,
    },
}

/// Application service for password login.
#[derive(Clone)]
pub struct LoginService {
    user_repository: Arc<dyn UserRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
    clock: Arc<dyn Clock>,
    lock_gate: AccountLockGate,
}

impl LoginService {
    /// Creates a new login service.
    #[must_use]
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        lock_repository: Arc<dyn AccountLockRepository>,
        password_hasher: Arc<dyn PasswordHasher>,
        clock: Arc<dyn Clock>,
        security_events: SecurityEventService,
        settings: GuardSettings,
    ) -> Self {
        Self {
            user_repository,
            password_hasher,
            clock,
            lock_gate: AccountLockGate::new(
                lock_repository,
                security_events,
                settings.login_lockout,
            ),
        }
    }

    /// Authenticates a user with email and password.
    ///
    /// Suspension is evaluated before the password is verified.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<LoginOutcome> {
        let user = match EmailAddress::new(email) {
            Ok(address) => self.user_repository.find_by_email(&address).await?,
            Err(_) => None,
        };

        let Some(user) = user else {
            let _ = self.password_hasher.hash_password(TIMING_PAD_PASSWORD);
            return Ok(LoginOutcome::Failed {
                remaining_attempts: None,
            });
        };

        let now = self.clock.now();
        let admitted = match self.lock_gate.admit(user.id, now).await? {
            Ok(admitted) => admitted,
            Err(remaining) => {
                return Ok(LoginOutcome::Suspended {
                    remaining_seconds: ceil_seconds(remaining),
                });
            }
        };

        let password_valid = self
            .password_hasher
            .verify_password(password, &user.password_hash)?;

        if !password_valid {
            let outcome = self
                .lock_gate
                .record_failure(user.id, &admitted, now, "password failures")
                .await?;
            tracing::info!(user_id = %user.id, "login rejected: invalid password");

            return Ok(match outcome {
                FailureOutcome::StillActive { remaining_attempts } => LoginOutcome::Failed {
                    remaining_attempts: Some(remaining_attempts),
                },
                FailureOutcome::Suspended { unlock_in } => LoginOutcome::Suspended {
                    remaining_seconds: ceil_seconds(unlock_in),
                },
            });
        }

        self.lock_gate.record_success(user.id, &admitted).await?;
        tracing::info!(user_id = %user.id, "login succeeded");

        Ok(LoginOutcome::Authenticated(user))
    }
}
