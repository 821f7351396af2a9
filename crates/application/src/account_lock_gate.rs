use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

use oasreg_core::AppResult;
use oasreg_domain::{AccountLockState, Admission, FailureOutcome, LoginLockout, UserId};

use crate::{
    AccountLockRepository, Revisioned, SecurityEvent, SecurityEventService, SecurityEventType,
};

/// Shared suspension handling for password login and device authentication.
#[derive(Clone)]
pub(crate) struct AccountLockGate {
    repository: Arc<dyn AccountLockRepository>,
    security_events: SecurityEventService,
    lockout: LoginLockout,
}

impl AccountLockGate {
    pub(crate) fn new(
        repository: Arc<dyn AccountLockRepository>,
        security_events: SecurityEventService,
        lockout: LoginLockout,
    ) -> Self {
        Self {
            repository,
            security_events,
            lockout,
        }
    }

    /// Loads the lock state and admits the attempt, or returns the time left.
    pub(crate) async fn admit(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Result<Revisioned<AccountLockState>, TimeDelta>> {
        let current = self.repository.load(user_id).await?;

        match self.lockout.admit(&current.value, now) {
            Admission::Suspended { remaining } => {
                tracing::info!(%user_id, "attempt rejected while account is suspended");
                Ok(Err(remaining))
            }
            Admission::Proceed {
                state,
                changed: false,
            } => Ok(Ok(Revisioned::new(state, current.revision))),
            Admission::Proceed {
                state,
                changed: true,
            } => {
                let revision = self
                    .repository
                    .store(user_id, &state, current.revision)
                    .await?;

                let event = if self.lockout.is_inconsistent(&current.value) {
                    SecurityEvent::for_user(
                        user_id,
                        SecurityEventType::StateInconsistent,
                        format!(
                            "reactivated account suspended without failure time (fail_count={})",
                            current.value.fail_count
                        ),
                    )
                } else {
                    SecurityEvent::for_user(
                        user_id,
                        SecurityEventType::AccountReactivated,
                        "unlock delay elapsed",
                    )
                };
                self.security_events.record_event(event).await;

                Ok(Ok(Revisioned::new(state, revision)))
            }
        }
    }

    /// Counts a hard failure against an admitted state.
    pub(crate) async fn record_failure(
        &self,
        user_id: UserId,
        admitted: &Revisioned<AccountLockState>,
        now: DateTime<Utc>,
        cause: &str,
    ) -> AppResult<FailureOutcome> {
        let (next, outcome) = self.lockout.record_failure(&admitted.value, now);
        self.repository
            .store(user_id, &next, admitted.revision)
            .await?;

        if let FailureOutcome::Suspended { .. } = outcome {
            self.security_events
                .record_event(SecurityEvent::for_user(
                    user_id,
                    SecurityEventType::AccountSuspended,
                    format!("suspended after {} consecutive {cause}", next.fail_count),
                ))
                .await;
        }

        Ok(outcome)
    }

    /// Clears the failure counter after a success.
    pub(crate) async fn record_success(
        &self,
        user_id: UserId,
        admitted: &Revisioned<AccountLockState>,
    ) -> AppResult<()> {
        if let Some(next) = self.lockout.record_success(&admitted.value) {
            self.repository
                .store(user_id, &next, admitted.revision)
                .await?;
        }
        Ok(())
    }
}
