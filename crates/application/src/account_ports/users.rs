use async_trait::async_trait;
use oasreg_core::AppResult;
use oasreg_domain::{EmailAddress, FamilyLevel, UserId};

/// User record returned by repository queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Unique user identifier.
    pub id: UserId,
    /// Current login email.
    pub email: EmailAddress,
    /// Display nick name.
    pub nick_name: String,
    /// Argon2id password hash.
    pub password_hash: String,
    /// Whether the current email passed code verification.
    pub email_verified: bool,
    /// Target address of an email change awaiting confirmation.
    pub pending_email: Option<EmailAddress>,
    /// Role inside the family group.
    pub family_level: FamilyLevel,
}

/// Fields needed to create a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Identifier to assign.
    pub id: UserId,
    /// Login email.
    pub email: EmailAddress,
    /// Display nick name.
    pub nick_name: String,
    /// Argon2id password hash.
    pub password_hash: String,
}

/// Repository port for user persistence.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Finds a user by identifier.
    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<UserRecord>>;

    /// Finds a user by current login email.
    async fn find_by_email(&self, email: &EmailAddress) -> AppResult<Option<UserRecord>>;

    /// Finds the user that has `email` as a pending change target.
    async fn find_by_pending_email(&self, email: &EmailAddress) -> AppResult<Option<UserRecord>>;

    /// Creates a user. Fails with `AppError::Conflict` when the email is taken.
    async fn create(&self, user: &NewUser) -> AppResult<()>;

    /// Marks the current email as verified.
    async fn mark_email_verified(&self, user_id: UserId) -> AppResult<()>;

    /// Sets or clears the pending email change target.
    async fn set_pending_email(
        &self,
        user_id: UserId,
        pending_email: Option<&EmailAddress>,
    ) -> AppResult<()>;

    /// Replaces the login email, clears the pending target and marks it verified.
    ///
    /// Fails with `AppError::Conflict` when another user took the address.
    async fn commit_email_change(&self, user_id: UserId, new_email: &EmailAddress)
    -> AppResult<()>;
}
