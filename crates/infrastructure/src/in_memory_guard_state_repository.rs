//! In-memory verification and account lock state for tests and single-process use.

use std::collections::HashMap;
use std::hash::Hash;

use async_trait::async_trait;
use oasreg_application::{AccountLockRepository, Revisioned, VerificationStateRepository};
use oasreg_core::{AppError, AppResult};
use oasreg_domain::{AccountLockState, UserId, VerificationPurpose, VerificationState};
use tokio::sync::RwLock;

/// In-memory adapter for the verification state and account lock ports.
#[derive(Default)]
pub struct InMemoryGuardStateRepository {
    verification_states: RwLock<HashMap<(UserId, VerificationPurpose), Revisioned<VerificationState>>>,
    account_locks: RwLock<HashMap<UserId, Revisioned<AccountLockState>>>,
}

impl InMemoryGuardStateRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn compare_and_store<K, T>(
    entries: &mut HashMap<K, Revisioned<T>>,
    key: K,
    value: &T,
    expected_revision: i64,
) -> AppResult<i64>
where
    K: Eq + Hash,
    T: Clone,
{
    let current_revision = entries.get(&key).map_or(0, |stored| stored.revision);
    if current_revision != expected_revision {
        return Err(AppError::Conflict(format!(
            "state changed since revision {expected_revision} (now {current_revision})"
        )));
    }

    let revision = expected_revision + 1;
    entries.insert(key, Revisioned::new(value.clone(), revision));

    Ok(revision)
}

#[async_trait]
impl VerificationStateRepository for InMemoryGuardStateRepository {
    async fn load(
        &self,
        user_id: UserId,
        purpose: VerificationPurpose,
    ) -> AppResult<Revisioned<VerificationState>> {
        Ok(self
            .verification_states
            .read()
            .await
            .get(&(user_id, purpose))
            .cloned()
            .unwrap_or_else(Revisioned::absent))
    }

    async fn store(
        &self,
        user_id: UserId,
        purpose: VerificationPurpose,
        state: &VerificationState,
        expected_revision: i64,
    ) -> AppResult<i64> {
        let mut entries = self.verification_states.write().await;
        compare_and_store(&mut entries, (user_id, purpose), state, expected_revision)
    }
}

#[async_trait]
impl AccountLockRepository for InMemoryGuardStateRepository {
    async fn load(&self, user_id: UserId) -> AppResult<Revisioned<AccountLockState>> {
        Ok(self
            .account_locks
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_else(Revisioned::absent))
    }

    async fn store(
        &self,
        user_id: UserId,
        state: &AccountLockState,
        expected_revision: i64,
    ) -> AppResult<i64> {
        let mut entries = self.account_locks.write().await;
        compare_and_store(&mut entries, user_id, state, expected_revision)
    }
}
