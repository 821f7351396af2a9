use chrono::{DateTime, Utc};
use oasreg_core::AppResult;

/// Time source for every lock, expiry and cooldown decision.
pub trait Clock: Send + Sync {
    /// Returns the current timezone-aware time.
    fn now(&self) -> DateTime<Utc>;
}

/// Uniform random byte source used to draw verification code digits.
pub trait RandomSource: Send + Sync {
    /// Fills `buffer` with uniformly distributed bytes.
    fn fill_bytes(&self, buffer: &mut [u8]) -> AppResult<()>;
}
