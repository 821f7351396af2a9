//! User identity types and registration rules.

use std::fmt::{Display, Formatter};

use oasreg_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random user identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a user identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for UserId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Maximum email length accepted by registration and email change.
pub const EMAIL_MAX_LENGTH: usize = 254;

/// Validated, lowercased email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Creates a validated email address.
    ///
    /// Requires a non-empty local part, exactly one `@` and a dotted domain.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let normalized = value.into().trim().to_lowercase();

        if normalized.is_empty() {
            return Err(AppError::Validation(
                "email address must not be empty".to_owned(),
            ));
        }

        if normalized.len() > EMAIL_MAX_LENGTH {
            return Err(AppError::Validation(format!(
                "email address must not exceed {EMAIL_MAX_LENGTH} characters"
            )));
        }

        let Some((local, domain)) = normalized.split_once('@') else {
            return Err(AppError::Validation(
                "email address must contain '@'".to_owned(),
            ));
        };

        if local.is_empty() || domain.contains('@') {
            return Err(AppError::Validation(
                "email address must have one '@' after a non-empty local part".to_owned(),
            ));
        }

        if domain.starts_with('.') || domain.ends_with('.') || !domain.contains('.') {
            return Err(AppError::Validation(
                "email domain must contain at least one inner '.'".to_owned(),
            ));
        }

        if normalized.chars().any(char::is_whitespace) {
            return Err(AppError::Validation(
                "email address must not contain whitespace".to_owned(),
            ));
        }

        Ok(Self(normalized))
    }

    /// Returns the validated email string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    fn local_part(&self) -> &str {
        self.0.split('@').next().unwrap_or_default()
    }
}

impl Display for EmailAddress {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

/// Role of a user inside a family group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FamilyLevel {
    /// Owner of the household controller; approves requests.
    Master,
    /// Regular household member.
    User,
    /// Not part of any family group.
    #[default]
    None,
}

impl FamilyLevel {
    /// Returns the storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::User => "user",
            Self::None => "none",
        }
    }

    /// Parses a storage string.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "master" => Ok(Self::Master),
            "user" => Ok(Self::User),
            "none" => Ok(Self::None),
            _ => Err(AppError::Validation(format!(
                "unknown family level '{value}'"
            ))),
        }
    }
}

/// Minimum password length.
pub const PASSWORD_MIN_LENGTH: usize = 8;

/// Maximum password length; bounds hashing cost.
pub const PASSWORD_MAX_LENGTH: usize = 128;

/// Maximum nick name length.
pub const NICK_NAME_MAX_LENGTH: usize = 30;

/// Validates a nick name and returns it trimmed.
pub fn validate_nick_name(nick_name: &str) -> AppResult<NonEmptyString> {
    let trimmed = NonEmptyString::new(nick_name.trim())
        .map_err(|_| AppError::Validation("nick name must not be empty".to_owned()))?;

    if trimmed.as_str().chars().count() > NICK_NAME_MAX_LENGTH {
        return Err(AppError::Validation(format!(
            "nick name must not exceed {NICK_NAME_MAX_LENGTH} characters"
        )));
    }

    Ok(trimmed)
}

/// Validates a new password for `email`.
///
/// Rejects short, overlong, all-numeric and common passwords, and passwords
/// that contain the email's local part.
pub fn validate_password(password: &str, email: &EmailAddress) -> AppResult<()> {
    let char_count = password.chars().count();

    if char_count < PASSWORD_MIN_LENGTH {
        return Err(AppError::Validation(format!(
            "password must be at least {PASSWORD_MIN_LENGTH} characters"
        )));
    }

    if char_count > PASSWORD_MAX_LENGTH {
        return Err(AppError::Validation(format!(
            "password must not exceed {PASSWORD_MAX_LENGTH} characters"
        )));
    }

    if password.chars().all(|character| character.is_ascii_digit()) {
        return Err(AppError::Validation(
            "password must not be entirely numeric".to_owned(),
        ));
    }

    let lowered = password.to_lowercase();
    let local = email.local_part();
    if local.chars().count() >= 3 && lowered.contains(local) {
        return Err(AppError::Validation(
            "password is too similar to the email address".to_owned(),
        ));
    }

    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        return Err(AppError::Validation(
            "this password is too common".to_owned(),
        ));
    }

    Ok(())
}

static COMMON_PASSWORDS: &[&str] = &[
    "password",
    "password1",
    "password123",
    "passw0rd",
    "qwerty123",
    "qwertyuiop",
    "iloveyou",
    "sunshine",
    "princess",
    "football",
    "baseball",
    "superman",
    "starwars",
    "trustno1",
    "whatever",
    "letmein1",
    "welcome1",
    "asdfghjkl",
    "1q2w3e4r",
    "q1w2e3r4",
    "zxcvbnm1",
    "abcd1234",
    "qwer1234",
    "admin123",
];
