//! One-time verification code generation and checking.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

use oasreg_core::{AppError, AppResult};
use oasreg_domain::{
    CodeRejection, VERIFICATION_CODE_LENGTH, VerificationCode, VerificationState, verify_code,
};

use crate::RandomSource;

/// Largest multiple of ten that fits in a byte; bytes at or above it are redrawn.
const DIGIT_BYTE_BOUND: u8 = 250;

const MAX_DRAW_ROUNDS: usize = 8;

/// Random source backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandomSource;

impl RandomSource for OsRandomSource {
    fn fill_bytes(&self, buffer: &mut [u8]) -> AppResult<()> {
        getrandom::fill(buffer).map_err(|error| {
            AppError::Internal(format!("failed to read operating system randomness: {error}"))
        })
    }
}

/// Issues and checks six digit verification codes.
#[derive(Clone)]
pub struct CodeIssuer {
    random_source: Arc<dyn RandomSource>,
}

impl CodeIssuer {
    /// Creates an issuer drawing digits from `random_source`.
    #[must_use]
    pub fn new(random_source: Arc<dyn RandomSource>) -> Self {
        Self { random_source }
    }

    /// Draws a fresh code stamped with `now`.
    pub fn issue(&self, now: DateTime<Utc>) -> AppResult<(VerificationCode, DateTime<Utc>)> {
        let mut digits = Vec::with_capacity(VERIFICATION_CODE_LENGTH);
        let mut buffer = [0_u8; 16];

        for _ in 0..MAX_DRAW_ROUNDS {
            self.random_source.fill_bytes(&mut buffer)?;
            let missing = VERIFICATION_CODE_LENGTH - digits.len();
            digits.extend(
                buffer
                    .iter()
                    .filter(|byte| **byte < DIGIT_BYTE_BOUND)
                    .map(|byte| byte % 10)
                    .take(missing),
            );

            if digits.len() == VERIFICATION_CODE_LENGTH {
                return Ok((VerificationCode::from_digits(&digits)?, now));
            }
        }

        Err(AppError::Internal(
            "random source did not yield enough unbiased bytes".to_owned(),
        ))
    }

    /// Checks a submitted code against the active one.
    pub fn verify(
        &self,
        state: &VerificationState,
        submitted: &str,
        now: DateTime<Utc>,
        ttl: TimeDelta,
    ) -> Result<(), CodeRejection> {
        verify_code(state, submitted, now, ttl)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use oasreg_domain::verification_code_ttl;

    use super::*;

    struct ScriptedRandom {
        rounds: Mutex<Vec<[u8; 16]>>,
    }

    impl RandomSource for ScriptedRandom {
        fn fill_bytes(&self, buffer: &mut [u8]) -> AppResult<()> {
            let mut rounds = self
                .rounds
                .lock()
                .map_err(|error| AppError::Internal(format!("lock poisoned: {error}")))?;
            let round = if rounds.is_empty() {
                [255_u8; 16]
            } else {
                rounds.remove(0)
            };
            buffer.copy_from_slice(&round);
            Ok(())
        }
    }

    fn issuer(rounds: Vec<[u8; 16]>) -> CodeIssuer {
        CodeIssuer::new(Arc::new(ScriptedRandom {
            rounds: Mutex::new(rounds),
        }))
    }

    #[test]
    fn biased_bytes_are_skipped() {
        let mut first = [255_u8; 16];
        first[..4].copy_from_slice(&[12, 250, 7, 249]);
        let mut second = [255_u8; 16];
        second[..3].copy_from_slice(&[30, 251, 41]);
        second[5] = 108;

        let now = Utc::now();
        let issued = issuer(vec![first, second]).issue(now);
        assert!(issued.is_ok());
        let (code, issued_at) = issued.unwrap_or_else(|_| unreachable!());
        assert_eq!(code.as_str(), "279018");
        assert_eq!(issued_at, now);
    }

    #[test]
    fn exhausted_source_is_an_internal_error() {
        assert!(matches!(
            issuer(Vec::new()).issue(Utc::now()),
            Err(AppError::Internal(_))
        ));
    }

    #[test]
    fn os_random_source_issues_six_digits() {
        let code = CodeIssuer::new(Arc::new(OsRandomSource)).issue(Utc::now());
        assert!(code.is_ok());
        let (code, _) = code.unwrap_or_else(|_| unreachable!());
        assert_eq!(code.as_str().len(), VERIFICATION_CODE_LENGTH);
        assert!(code.as_str().chars().all(|digit| digit.is_ascii_digit()));
    }

    #[test]
    fn code_verifies_once_then_reports_no_active_code() {
        let now = Utc::now();
        let issuer = CodeIssuer::new(Arc::new(OsRandomSource));
        let (code, issued_at) = issuer.issue(now).unwrap_or_else(|_| unreachable!());
        let state = VerificationState::default().with_code(&code, issued_at);

        assert_eq!(
            issuer.verify(&state, code.as_str(), now, verification_code_ttl()),
            Ok(())
        );

        let reset = VerificationState::default();
        assert_eq!(
            issuer.verify(&reset, code.as_str(), now, verification_code_ttl()),
            Err(CodeRejection::NoActiveCode)
        );
    }
}
