//! Argon2id password hashing for account logins.
//!
//! Stored hashes are PHC strings. Only Argon2id hashes are accepted on
//! verification; anything else is treated as a corrupted record.

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use oasreg_application::PasswordHasher as PasswordHasherPort;
use oasreg_core::{AppError, AppResult};

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Cost {
    /// Memory in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for Argon2Cost {
    /// OWASP baseline: m=19456 (19 MiB), t=2, p=1.
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Argon2id hasher for account passwords.
#[derive(Clone)]
pub struct Argon2PasswordHasher {
    argon2: Argon2<'static>,
}

impl Argon2PasswordHasher {
    /// Creates a hasher with the baseline cost.
    #[must_use]
    pub fn new() -> Self {
        Self::with_cost(Argon2Cost::default()).unwrap_or_else(|_| Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default()),
        })
    }

    /// Creates a hasher with an explicit cost.
    pub fn with_cost(cost: Argon2Cost) -> AppResult<Self> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|error| AppError::Validation(format!("invalid argon2 cost {cost:?}: {error}")))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl Default for Argon2PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasherPort for Argon2PasswordHasher {
    fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|error| AppError::Internal(format!("failed to hash password: {error}")))
    }

    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        let stored = PasswordHash::new(hash).map_err(|error| {
            AppError::Internal(format!("stored password hash is not a PHC string: {error}"))
        })?;

        if stored.algorithm != Algorithm::Argon2id.ident() {
            return Err(AppError::Internal(format!(
                "stored password hash uses unsupported algorithm '{}'",
                stored.algorithm
            )));
        }

        match self.argon2.verify_password(password.as_bytes(), &stored) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(error) => Err(AppError::Internal(format!(
                "password verification failed: {error}"
            ))),
        }
    }
}
