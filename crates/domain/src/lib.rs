//! Domain entities, invariants and lock decisions.

#![forbid(unsafe_code)]

mod account_lock;
mod approval;
mod cooldown;
mod device;
mod lock_policy;
mod user;
mod verification;

pub use account_lock::{
    AccountLockState, Admission, DEFAULT_SUSPEND_THRESHOLD, DEFAULT_UNLOCK_DELAY_MINUTES,
    FailureOutcome, LoginLockout,
};
pub use approval::{ApprovalRequest, ApprovalRequestId, ApprovalStatus};
pub use cooldown::{
    CooldownPolicy, CooldownRecord, CooldownStatus, DEFAULT_COOLDOWN_MINUTES, RequestType,
};
pub use device::{QR_CODE_TTL_MINUTES, QR_TIME_FORMAT, QrPayload, qr_code_ttl};
pub use lock_policy::{
    DEFAULT_LOCK_MINUTES, DEFAULT_MAX_ATTEMPTS, Decision, LockPolicy, LockResolution,
};
pub use user::{
    EMAIL_MAX_LENGTH, EmailAddress, FamilyLevel, NICK_NAME_MAX_LENGTH, PASSWORD_MAX_LENGTH,
    PASSWORD_MIN_LENGTH, UserId, validate_nick_name, validate_password,
};
pub use verification::{
    CodeRejection, VERIFICATION_CODE_LENGTH, VERIFICATION_CODE_TTL_MINUTES, VerificationCode,
    VerificationPurpose, VerificationState, verification_code_ttl, verify_code,
};
