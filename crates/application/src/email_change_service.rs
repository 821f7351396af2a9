//! Email address change with re-authentication of the new address.
//!
//! Change requests and wrong confirmation codes share the `EmailReauth`
//! counter, so a user cannot cycle requests to dodge the confirmation lock.

use std::sync::Arc;

use oasreg_core::{AppError, AppResult};
use oasreg_domain::{
    CodeRejection, Decision, EmailAddress, LockResolution, UserId, VerificationPurpose,
    VerificationState,
};

use crate::email_verification_service::{VERIFICATION_EMAIL_SUBJECT, verification_email_body};
use crate::{
    Clock, CodeIssuer, EmailService, GuardOutcome, GuardSettings, Revisioned, SecurityEvent,
    SecurityEventService, SecurityEventType, UserRecord, UserRepository,
    VerificationStateRepository,
};

/// Application service for changing a user's login email.
#[derive(Clone)]
pub struct EmailChangeService {
    user_repository: Arc<dyn UserRepository>,
    state_repository: Arc<dyn VerificationStateRepository>,
    email_service: Arc<dyn EmailService>,
    clock: Arc<dyn Clock>,
    code_issuer: CodeIssuer,
    security_events: SecurityEventService,
    settings: GuardSettings,
}

impl EmailChangeService {
    /// Creates a new email change service.
    #[must_use]
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        state_repository: Arc<dyn VerificationStateRepository>,
        email_service: Arc<dyn EmailService>,
        clock: Arc<dyn Clock>,
        code_issuer: CodeIssuer,
        security_events: SecurityEventService,
        settings: GuardSettings,
    ) -> Self {
        Self {
            user_repository,
            state_repository,
            email_service,
            clock,
            code_issuer,
            security_events,
            settings,
        }
    }

    /// Requests a change to `new_email` and sends a code to it.
    ///
    /// An active lock is reported before the address is validated; an
    /// expired one is cleared first.
    pub async fn request_change(
        &self,
        user_id: UserId,
        new_email: &str,
    ) -> AppResult<GuardOutcome> {
        let user = self.require_user(user_id).await?;
        let now = self.clock.now();

        let current = match self.resolve_lock(user_id, now).await? {
            Ok(current) => current,
            Err(denied) => return Ok(denied),
        };

        let new_email = self.validate_new_email(&user, new_email).await?;

        let policy = self.settings.email_lock;
        let (next, locking) = match policy.decide(&current.value, now) {
            Decision::DenyLocked { remaining } => return Ok(GuardOutcome::denied(remaining)),
            Decision::Allow(next) => (next, false),
            Decision::WillLockNow(next) => (next, true),
        };

        let (code, issued_at) = self.code_issuer.issue(now)?;
        let next = next.with_code(&code, issued_at);
        self.state_repository
            .store(
                user_id,
                VerificationPurpose::EmailReauth,
                &next,
                current.revision,
            )
            .await?;
        self.user_repository
            .set_pending_email(user_id, Some(&new_email))
            .await?;

        if locking {
            self.record_lock(user_id, "email change requests").await;
        }

        let text_body = verification_email_body(&code, self.settings.code_ttl.num_minutes());
        self.email_service
            .send_email(
                new_email.as_str(),
                VERIFICATION_EMAIL_SUBJECT,
                &text_body,
                None,
            )
            .await?;
        tracing::info!(%user_id, attempt = next.attempt_count, "email change code sent");

        Ok(if locking {
            GuardOutcome::will_lock(policy.lock_duration())
        } else {
            GuardOutcome::Ok
        })
    }

    /// Confirms the pending change with the code sent to the new address.
    ///
    /// Wrong codes count toward the same lock as change requests.
    pub async fn verify_change(&self, user_id: UserId, submitted: &str) -> AppResult<GuardOutcome> {
        let user = self.require_user(user_id).await?;
        let now = self.clock.now();

        let current = match self.resolve_lock(user_id, now).await? {
            Ok(current) => current,
            Err(denied) => return Ok(denied),
        };

        let Some(new_email) = user.pending_email else {
            return Ok(GuardOutcome::NoActiveCode);
        };

        let policy = self.settings.email_lock;
        match self
            .code_issuer
            .verify(&current.value, submitted, now, self.settings.code_ttl)
        {
            Ok(()) => {}
            Err(CodeRejection::Mismatch) => {
                let (next, locked) = policy.record_failure(&current.value, now);
                self.state_repository
                    .store(
                        user_id,
                        VerificationPurpose::EmailReauth,
                        &next,
                        current.revision,
                    )
                    .await?;

                if locked {
                    self.record_lock(user_id, "email change confirmations").await;
                    return Ok(GuardOutcome::will_lock(policy.lock_duration()));
                }

                return Ok(GuardOutcome::Mismatch {
                    remaining_attempts: Some(policy.remaining_attempts(&next)),
                });
            }
            Err(rejection) => {
                return Ok(GuardOutcome::rejected(
                    rejection,
                    Some(policy.remaining_attempts(&current.value)),
                ));
            }
        }

        // A rejected commit leaves the code and the pending address in place.
        self.user_repository
            .commit_email_change(user_id, &new_email)
            .await?;
        self.state_repository
            .store(
                user_id,
                VerificationPurpose::EmailReauth,
                &VerificationState::default(),
                current.revision,
            )
            .await?;

        let auth_state = self
            .state_repository
            .load(user_id, VerificationPurpose::EmailAuth)
            .await?;
        if auth_state.value != VerificationState::default() {
            self.state_repository
                .store(
                    user_id,
                    VerificationPurpose::EmailAuth,
                    &VerificationState::default(),
                    auth_state.revision,
                )
                .await?;
        }

        tracing::info!(%user_id, "email address changed");
        Ok(GuardOutcome::Ok)
    }

    /// Clears ghost or expired locks, persisting the cleared state.
    async fn resolve_lock(
        &self,
        user_id: UserId,
        now: chrono::DateTime<chrono::Utc>,
    ) -> AppResult<Result<Revisioned<VerificationState>, GuardOutcome>> {
        let current = self
            .state_repository
            .load(user_id, VerificationPurpose::EmailReauth)
            .await?;
        let policy = self.settings.email_lock;

        match policy.resolve(&current.value, now) {
            LockResolution::Locked { remaining } => {
                tracing::info!(%user_id, "email change denied by lock");
                Ok(Err(GuardOutcome::denied(remaining)))
            }
            LockResolution::Open {
                state,
                changed: false,
            } => Ok(Ok(Revisioned::new(state, current.revision))),
            LockResolution::Open {
                state,
                changed: true,
            } => {
                let revision = self
                    .state_repository
                    .store(
                        user_id,
                        VerificationPurpose::EmailReauth,
                        &state,
                        current.revision,
                    )
                    .await?;

                if policy.is_ghost_lock(&current.value) {
                    self.security_events
                        .record_event(SecurityEvent::for_user(
                            user_id,
                            SecurityEventType::StateInconsistent,
                            format!(
                                "reset contradictory email_reauth lock (locked={}, locked_at={:?}, attempts={})",
                                current.value.locked,
                                current.value.locked_at,
                                current.value.attempt_count
                            ),
                        ))
                        .await;
                }

                Ok(Ok(Revisioned::new(state, revision)))
            }
        }
    }

    async fn validate_new_email(&self, user: &UserRecord, value: &str) -> AppResult<EmailAddress> {
        let new_email = EmailAddress::new(value)?;

        if new_email == user.email {
            return Err(AppError::Validation(
                "new email must differ from the current one".to_owned(),
            ));
        }

        if self
            .user_repository
            .find_by_email(&new_email)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "email address is already in use".to_owned(),
            ));
        }

        if let Some(other) = self
            .user_repository
            .find_by_pending_email(&new_email)
            .await?
            && other.id != user.id
        {
            return Err(AppError::Conflict(
                "email address is already awaiting confirmation by another account".to_owned(),
            ));
        }

        Ok(new_email)
    }

    async fn require_user(&self, user_id: UserId) -> AppResult<UserRecord> {
        self.user_repository
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' not found")))
    }

    async fn record_lock(&self, user_id: UserId, subject: &str) {
        self.security_events
            .record_event(SecurityEvent::for_user(
                user_id,
                SecurityEventType::VerificationLocked,
                format!("{subject} locked"),
            ))
            .await;
    }
}
