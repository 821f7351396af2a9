//! Application services and ports for the account guard flows.

#![forbid(unsafe_code)]

mod account_lock_gate;
mod account_ports;
mod account_service;
mod approval_service;
mod code_issuer;
mod cooldown_service;
mod device_auth_service;
mod email_change_service;
mod email_verification_service;
mod guard_outcome;
mod guard_ports;
mod guard_settings;
mod login_service;
mod security_event_service;

#[cfg(test)]
mod test_support;

pub use account_ports::{
    ApprovalRepository, DeviceRegistry, EmailService, NewUser, PasswordHasher,
    QrPayloadDecryptor, UserRecord, UserRepository,
};
pub use account_service::{AccountService, RegisterParams};
pub use approval_service::{ApprovalService, ApprovalSubmission};
pub use code_issuer::{CodeIssuer, OsRandomSource};
pub use cooldown_service::CooldownService;
pub use device_auth_service::{DeviceAuthOutcome, DeviceAuthService};
pub use email_change_service::EmailChangeService;
pub use email_verification_service::{
    EmailVerificationService, VERIFICATION_EMAIL_SUBJECT, verification_email_body,
};
pub use guard_outcome::{GuardOutcome, ceil_seconds};
pub use guard_ports::{
    AccountLockRepository, Clock, CooldownRepository, RandomSource, Revisioned,
    VerificationStateRepository,
};
pub use guard_settings::{DEFAULT_QR_UTC_OFFSET_SECONDS, GuardSettings};
pub use login_service::{LoginOutcome, LoginService};
pub use security_event_service::{
    SecurityEvent, SecurityEventLevel, SecurityEventRepository, SecurityEventService,
    SecurityEventType,
};
