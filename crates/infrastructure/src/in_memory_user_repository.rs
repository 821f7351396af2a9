use std::collections::HashMap;

use async_trait::async_trait;
use oasreg_application::{NewUser, UserRecord, UserRepository};
use oasreg_core::{AppError, AppResult};
use oasreg_domain::{EmailAddress, FamilyLevel, UserId};
use tokio::sync::RwLock;

/// In-memory adapter for user persistence.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<UserId, UserRecord>>,
}

impl InMemoryUserRepository {
    /// Creates an empty user store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the family role of an existing user.
    pub async fn set_family_level(&self, user_id: UserId, level: FamilyLevel) -> AppResult<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' not found")))?;
        user.family_level = level;
        Ok(())
    }

    async fn update<F>(&self, user_id: UserId, apply: F) -> AppResult<()>
    where
        F: FnOnce(&mut UserRecord) + Send,
    {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' not found")))?;
        apply(user);
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<UserRecord>> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }

    async fn find_by_email(&self, email: &EmailAddress) -> AppResult<Option<UserRecord>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| &user.email == email)
            .cloned())
    }

    async fn find_by_pending_email(&self, email: &EmailAddress) -> AppResult<Option<UserRecord>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| user.pending_email.as_ref() == Some(email))
            .cloned())
    }

    async fn create(&self, user: &NewUser) -> AppResult<()> {
        let mut users = self.users.write().await;
        if users.values().any(|existing| existing.email == user.email) {
            return Err(AppError::Conflict(format!(
                "email '{}' is already registered",
                user.email
            )));
        }

        users.insert(
            user.id,
            UserRecord {
                id: user.id,
                email: user.email.clone(),
                nick_name: user.nick_name.clone(),
                password_hash: user.password_hash.clone(),
                email_verified: false,
                pending_email: None,
                family_level: FamilyLevel::None,
            },
        );
        Ok(())
    }

    async fn mark_email_verified(&self, user_id: UserId) -> AppResult<()> {
        self.update(user_id, |user| user.email_verified = true).await
    }

    async fn set_pending_email(
        &self,
        user_id: UserId,
        pending_email: Option<&EmailAddress>,
    ) -> AppResult<()> {
        let pending_email = pending_email.cloned();
        self.update(user_id, |user| user.pending_email = pending_email)
            .await
    }

    async fn commit_email_change(
        &self,
        user_id: UserId,
        new_email: &EmailAddress,
    ) -> AppResult<()> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|existing| existing.id != user_id && &existing.email == new_email)
        {
            return Err(AppError::Conflict(format!(
                "email '{new_email}' is already registered"
            )));
        }

        let user = users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' not found")))?;
        user.email = new_email.clone();
        user.pending_email = None;
        user.email_verified = true;
        Ok(())
    }
}
