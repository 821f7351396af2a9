//! Account registration.

use std::sync::Arc;

use oasreg_core::{AppError, AppResult};
use oasreg_domain::{
    AccountLockState, EmailAddress, UserId, VerificationPurpose, VerificationState,
    validate_nick_name, validate_password,
};

use crate::{
    AccountLockRepository, NewUser, PasswordHasher, UserRepository, VerificationStateRepository,
};

/// Parameters for user registration.
#[derive(Debug, Clone)]
pub struct RegisterParams {
    /// Login email.
    pub email: String,
    /// Display nick name.
    pub nick_name: String,
    /// Plaintext password.
    pub password: String,
    /// Repeated password.
    pub password_confirmation: String,
}

/// Application service for creating accounts.
#[derive(Clone)]
pub struct AccountService {
    user_repository: Arc<dyn UserRepository>,
    state_repository: Arc<dyn VerificationStateRepository>,
    lock_repository: Arc<dyn AccountLockRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
}

impl AccountService {
    /// Creates a new account service.
    #[must_use]
    pub fn new(
        user_repository: Arc<dyn UserRepository>,
        state_repository: Arc<dyn VerificationStateRepository>,
        lock_repository: Arc<dyn AccountLockRepository>,
        password_hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            user_repository,
            state_repository,
            lock_repository,
            password_hasher,
        }
    }

    /// Registers a user together with its verification and lock state.
    pub async fn register(&self, params: RegisterParams) -> AppResult<UserId> {
        if params.password != params.password_confirmation {
            return Err(AppError::Validation("passwords do not match".to_owned()));
        }

        let email = EmailAddress::new(&params.email)?;
        let nick_name = validate_nick_name(&params.nick_name)?;
        validate_password(&params.password, &email)?;

        if self.user_repository.find_by_email(&email).await?.is_some() {
            let _ = self.password_hasher.hash_password(&params.password);
            return Err(AppError::Conflict(
                "an account with this email already exists".to_owned(),
            ));
        }

        if self
            .user_repository
            .find_by_pending_email(&email)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "email address is awaiting confirmation by another account".to_owned(),
            ));
        }

        let user = NewUser {
            id: UserId::new(),
            email,
            nick_name: nick_name.into(),
            password_hash: self.password_hasher.hash_password(&params.password)?,
        };
        self.user_repository.create(&user).await?;

        for purpose in VerificationPurpose::ALL {
            self.state_repository
                .store(user.id, purpose, &VerificationState::default(), 0)
                .await?;
        }
        self.lock_repository
            .store(user.id, &AccountLockState::default(), 0)
            .await?;

        tracing::info!(user_id = %user.id, "account registered");
        Ok(user.id)
    }
}
