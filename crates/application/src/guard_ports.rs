mod clock;
mod revision;
mod state;

pub use clock::{Clock, RandomSource};
pub use revision::Revisioned;
pub use state::{AccountLockRepository, CooldownRepository, VerificationStateRepository};
