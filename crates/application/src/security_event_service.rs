use std::sync::Arc;

use async_trait::async_trait;

use oasreg_core::AppResult;
use oasreg_domain::UserId;

/// Severity of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEventLevel {
    /// Expected, noteworthy transition.
    Info,
    /// Repeated failures or repaired state.
    Warning,
    /// Failure that needs operator attention.
    Error,
}

impl SecurityEventLevel {
    /// Returns the storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// Stable diagnostic event identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEventType {
    /// A contradictory lock state was found and reset.
    StateInconsistent,
    /// An email verification lock engaged.
    VerificationLocked,
    /// An account was suspended after repeated hard failures.
    AccountSuspended,
    /// A suspended account was reactivated after the unlock delay.
    AccountReactivated,
    /// A controller QR payload could not be decrypted or parsed.
    QrDecryptFailed,
    /// An outgoing email was dropped after its last delivery attempt.
    EmailDeliveryFailed,
}

impl SecurityEventType {
    /// Returns the storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StateInconsistent => "state_inconsistent",
            Self::VerificationLocked => "verification_locked",
            Self::AccountSuspended => "account_suspended",
            Self::AccountReactivated => "account_reactivated",
            Self::QrDecryptFailed => "qr_decrypt_failed",
            Self::EmailDeliveryFailed => "email_delivery_failed",
        }
    }

    /// Level the event is recorded at.
    #[must_use]
    pub fn level(&self) -> SecurityEventLevel {
        match self {
            Self::AccountReactivated => SecurityEventLevel::Info,
            Self::StateInconsistent
            | Self::VerificationLocked
            | Self::AccountSuspended
            | Self::QrDecryptFailed => SecurityEventLevel::Warning,
            Self::EmailDeliveryFailed => SecurityEventLevel::Error,
        }
    }
}

/// Diagnostic event payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityEvent {
    /// Affected user if known.
    pub user_id: Option<UserId>,
    /// Stable event type.
    pub event_type: SecurityEventType,
    /// Event severity.
    pub level: SecurityEventLevel,
    /// Human-readable detail.
    pub message: String,
}

impl SecurityEvent {
    /// Creates an event for a user at the type's default level.
    #[must_use]
    pub fn for_user(
        user_id: UserId,
        event_type: SecurityEventType,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id: Some(user_id),
            event_type,
            level: event_type.level(),
            message: message.into(),
        }
    }

    /// Creates an event that is not tied to a user.
    #[must_use]
    pub fn unattributed(event_type: SecurityEventType, message: impl Into<String>) -> Self {
        Self {
            user_id: None,
            event_type,
            level: event_type.level(),
            message: message.into(),
        }
    }
}

/// Repository port for diagnostic event persistence.
#[async_trait]
pub trait SecurityEventRepository: Send + Sync {
    /// Appends an event entry.
    async fn append_event(&self, event: SecurityEvent) -> AppResult<()>;
}

/// Application service for diagnostic event recording.
#[derive(Clone)]
pub struct SecurityEventService {
    repository: Arc<dyn SecurityEventRepository>,
}

impl SecurityEventService {
    /// Creates a service from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn SecurityEventRepository>) -> Self {
        Self { repository }
    }

    /// Emits the event through `tracing` and persists it.
    ///
    /// A failed append is logged and does not fail the calling flow.
    pub async fn record_event(&self, event: SecurityEvent) {
        let user_id = event
            .user_id
            .map(|user_id| user_id.to_string())
            .unwrap_or_default();
        let event_type = event.event_type.as_str();

        match event.level {
            SecurityEventLevel::Info => {
                tracing::info!(%user_id, event_type, message = %event.message, "security event");
            }
            SecurityEventLevel::Warning => {
                tracing::warn!(%user_id, event_type, message = %event.message, "security event");
            }
            SecurityEventLevel::Error => {
                tracing::error!(%user_id, event_type, message = %event.message, "security event");
            }
        }

        if let Err(error) = self.repository.append_event(event).await {
            tracing::warn!(%user_id, event_type, %error, "failed to persist security event");
        }
    }
}
