//! Email ownership verification after registration.
//!
//! Sends are counted against the `EmailAuth` lock; confirmations are not,
//! so a wrong code carries no attempts hint.

use std::sync::Arc;

use oasreg_core::{AppError, AppResult};
use oasreg_domain::{Decision, UserId, VerificationCode, VerificationPurpose, VerificationState};

use crate::{
    Clock, CodeIssuer, EmailService, GuardOutcome, GuardSettings, SecurityEvent,
    SecurityEventService, SecurityEventType, UserRecord, UserRepository,
    VerificationStateRepository,
};

/// Subject line of verification code emails.
pub const VERIFICATION_EMAIL_SUBJECT: &str = "Your email verification code";

/// Application service for the initial email verification flow.
#[derive(Clone)]
pub struct EmailVerificationService {
    user_repository: Arc<dyn UserRepository>,
    state_repository: Arc<dyn VerificationStateRepository>,
    email_service: Arc<dyn EmailService>,
    clock: Arc<dyn Clock>,
    code_issuer: CodeIssuer,
    security_events: SecurityEventService,
    settings: GuardSettings,
}

impl EmailVerificationService {
    /// Creates a new email verification service.
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

    /// Issues a code to the user's current address.
    ///
    /// The counted state and the new code are stored before the email is sent.
    pub async fn send_code(&self, user_id: UserId) -> AppResult<GuardOutcome> {
        let user = self.require_user(user_id).await?;
        if user.email_verified {
            return Err(AppError::Validation(
                "email address is already verified".to_owned(),
            ));
        }

        let now = self.clock.now();
        let current = self
            .state_repository
            .load(user_id, VerificationPurpose::EmailAuth)
            .await?;
        let policy = self.settings.email_lock;
        let repaired = policy.is_ghost_lock(&current.value);

        let (next, locking) = match policy.decide(&current.value, now) {
            Decision::DenyLocked { remaining } => {
                tracing::info!(%user_id, "verification code send denied by lock");
                return Ok(GuardOutcome::denied(remaining));
            }
            Decision::Allow(next) => (next, false),
            Decision::WillLockNow(next) => (next, true),
        };

        let (code, issued_at) = self.code_issuer.issue(now)?;
        let next = next.with_code(&code, issued_at);
        self.state_repository
            .store(
                user_id,
                VerificationPurpose::EmailAuth,
                &next,
                current.revision,
            )
            .await?;

        if repaired {
            self.record_repair(user_id, &current.value).await;
        }
        if locking {
            self.security_events
                .record_event(SecurityEvent::for_user(
                    user_id,
                    SecurityEventType::VerificationLocked,
                    format!(
                        "email verification sends locked after {} attempts",
                        next.attempt_count
                    ),
                ))
                .await;
        }

        self.deliver_code(user.email.as_str(), &code).await?;
        tracing::info!(%user_id, attempt = next.attempt_count, "verification code sent");

        Ok(if locking {
            GuardOutcome::will_lock(policy.lock_duration())
        } else {
            GuardOutcome::Ok
        })
    }

    /// Confirms a submitted code and marks the address verified.
    pub async fn confirm_code(&self, user_id: UserId, submitted: &str) -> AppResult<GuardOutcome> {
        self.require_user(user_id).await?;

        let now = self.clock.now();
        let current = self
            .state_repository
            .load(user_id, VerificationPurpose::EmailAuth)
            .await?;

        if let Err(rejection) =
            self.code_issuer
                .verify(&current.value, submitted, now, self.settings.code_ttl)
        {
            return Ok(GuardOutcome::rejected(rejection, None));
        }

        // The code stays usable until the user record is written.
        self.user_repository.mark_email_verified(user_id).await?;
        self.state_repository
            .store(
                user_id,
                VerificationPurpose::EmailAuth,
                &VerificationState::default(),
                current.revision,
            )
            .await?;
        tracing::info!(%user_id, "email address verified");

        Ok(GuardOutcome::Ok)
    }

    async fn require_user(&self, user_id: UserId) -> AppResult<UserRecord> {
        self.user_repository
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' not found")))
    }

    async fn record_repair(&self, user_id: UserId, state: &VerificationState) {
        self.security_events
            .record_event(SecurityEvent::for_user(
                user_id,
                SecurityEventType::StateInconsistent,
                format!(
                    "reset contradictory email_auth lock (locked={}, locked_at={:?}, attempts={})",
                    state.locked, state.locked_at, state.attempt_count
                ),
            ))
            .await;
    }

    async fn deliver_code(&self, to: &str, code: &VerificationCode) -> AppResult<()> {
        let text_body = verification_email_body(code, self.settings.code_ttl.num_minutes());
        self.email_service
            .send_email(to, VERIFICATION_EMAIL_SUBJECT, &text_body, None)
            .await
    }
}

/// Plain-text body of a verification code email.
#[must_use]
pub fn verification_email_body(code: &VerificationCode, ttl_minutes: i64) -> String {
    format!(
        "Your verification code is {code}.\n\n\
         Enter it within {ttl_minutes} minutes to confirm this address."
    )
}

#[cfg(test)]
mod tests;
