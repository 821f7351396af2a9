use chrono::{FixedOffset, Offset, TimeDelta, Utc};
use oasreg_domain::{CooldownPolicy, LockPolicy, LoginLockout, qr_code_ttl, verification_code_ttl};

/// Default offset of the wall-clock time stamped into QR payloads (UTC+09:00).
pub const DEFAULT_QR_UTC_OFFSET_SECONDS: i32 = 9 * 3600;

/// Thresholds and windows shared by the guarded flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardSettings {
    /// Lock applied to code sends, email change requests and change confirmations.
    pub email_lock: LockPolicy,
    /// Verification code lifetime.
    pub code_ttl: TimeDelta,
    /// Login and device authentication suspension.
    pub login_lockout: LoginLockout,
    /// Cooldown after cancelling a request.
    pub cooldown: CooldownPolicy,
    /// QR payload lifetime.
    pub qr_code_ttl: TimeDelta,
    /// Offset of the local time stamped into QR payloads.
    pub qr_time_offset: FixedOffset,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            email_lock: LockPolicy::default(),
            code_ttl: verification_code_ttl(),
            login_lockout: LoginLockout::default(),
            cooldown: CooldownPolicy::default(),
            qr_code_ttl: qr_code_ttl(),
            qr_time_offset: FixedOffset::east_opt(DEFAULT_QR_UTC_OFFSET_SECONDS)
                .unwrap_or_else(|| Utc.fix()),
        }
    }
}
