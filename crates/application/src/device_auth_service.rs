//! Household controller authentication from scanned QR payloads.
//!
//! Undecryptable payloads count toward the same suspension as wrong
//! passwords, and a suspended account never reaches decryption.

use std::sync::Arc;

use oasreg_core::{AppError, AppResult};
use oasreg_domain::{FailureOutcome, QrPayload, UserId};

use crate::account_lock_gate::AccountLockGate;
use crate::guard_outcome::ceil_seconds;
use crate::{
    AccountLockRepository, Clock, DeviceRegistry, GuardSettings, QrPayloadDecryptor,
    SecurityEvent, SecurityEventService, SecurityEventType, UserRepository,
};

/// Result of a controller authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceAuthOutcome {
    /// The controller is registered and may be linked to the account.
    Accepted(QrPayload),
    /// The account is suspended; the payload was not decrypted.
    Suspended {
        /// Whole seconds until reactivation, rounded up.
        remaining_seconds: i64,
    },
    /// The payload could not be decrypted or parsed.
    InvalidPayload {
        /// Failures left before suspension.
        remaining_attempts: u32,
    },
    /// The QR code is older than its time-to-live.
    QrExpired,
    /// The account's email address is not verified yet.
    EmailNotVerified,
    /// The remote registry does not know the controller.
    NotRegistered,
}

/// Application service for controller authentication.
#[derive(Clone)]
pub struct DeviceAuthService {
    user_repository: Arc<dyn UserRepository>,
    decryptor: Arc<dyn QrPayloadDecryptor>,
    device_registry: Arc<dyn DeviceRegistry>,
    clock: Arc<dyn Clock>,
    security_events: SecurityEventService,
    lock_gate: AccountLockGate,
    settings: GuardSettings,
}

impl DeviceAuthService {
    /// Creates a new device authentication service.
    #[must_use]
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        lock_repository: Arc<dyn AccountLockRepository>,
        decryptor: Arc<dyn QrPayloadDecryptor>,
        device_registry: Arc<dyn DeviceRegistry>,
        clock: Arc<dyn Clock>,
        security_events: SecurityEventService,
        settings: GuardSettings,
    ) -> Self {
        Self {
            user_repository,
            decryptor,
            device_registry,
            clock,
            lock_gate: AccountLockGate::new(
                lock_repository,
                security_events.clone(),
                settings.login_lockout,
            ),
            security_events,
            settings,
        }
    }

    /// Authenticates a controller from an encrypted QR payload.
    pub async fn authenticate(
        &self,
        user_id: UserId,
        encrypted: &str,
    ) -> AppResult<DeviceAuthOutcome> {
        let user = self
            .user_repository
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' not found")))?;

        if encrypted.trim().is_empty() {
            return Err(AppError::Validation(
                "encrypted QR payload must not be empty".to_owned(),
            ));
        }

        let now = self.clock.now();
        let admitted = match self.lock_gate.admit(user_id, now).await? {
            Ok(admitted) => admitted,
            Err(remaining) => {
                return Ok(DeviceAuthOutcome::Suspended {
                    remaining_seconds: ceil_seconds(remaining),
                });
            }
        };

        let payload = match self.decode(user_id, encrypted)? {
            Ok(payload) => payload,
            Err(reason) => {
                self.security_events
                    .record_event(SecurityEvent::for_user(
                        user_id,
                        SecurityEventType::QrDecryptFailed,
                        reason,
                    ))
                    .await;

                let outcome = self
                    .lock_gate
                    .record_failure(user_id, &admitted, now, "QR decrypt failures")
                    .await?;

                return Ok(match outcome {
                    FailureOutcome::StillActive { remaining_attempts } => {
                        DeviceAuthOutcome::InvalidPayload { remaining_attempts }
                    }
                    FailureOutcome::Suspended { unlock_in } => DeviceAuthOutcome::Suspended {
                        remaining_seconds: ceil_seconds(unlock_in),
                    },
                });
            }
        };

        self.lock_gate.record_success(user_id, &admitted).await?;

        if payload.is_expired(now, self.settings.qr_code_ttl) {
            return Ok(DeviceAuthOutcome::QrExpired);
        }

        if !user.email_verified {
            return Ok(DeviceAuthOutcome::EmailNotVerified);
        }

        if !self
            .device_registry
            .is_registered(&payload.dev_id(), &payload.device_id)
            .await?
        {
            tracing::info!(%user_id, device_id = %payload.device_id, "controller is not registered");
            return Ok(DeviceAuthOutcome::NotRegistered);
        }

        tracing::info!(%user_id, device_id = %payload.device_id, "controller authenticated");
        Ok(DeviceAuthOutcome::Accepted(payload))
    }

    /// Decrypts and parses, separating payload rejections from collaborator errors.
    fn decode(&self, user_id: UserId, encrypted: &str) -> AppResult<Result<QrPayload, String>> {
        let Some(plaintext) = self.decryptor.decrypt(user_id, encrypted)? else {
            return Ok(Err("QR payload could not be decrypted".to_owned()));
        };

        Ok(
            QrPayload::parse(&plaintext, self.settings.qr_time_offset)
                .map_err(|error| error.to_string()),
        )
    }
}

#[cfg(test)]
mod tests;
