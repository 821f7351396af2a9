use async_trait::async_trait;
use oasreg_core::AppResult;
use oasreg_domain::UserId;

/// Port for sending emails. Infrastructure provides SMTP, console and queued implementations.
#[async_trait]
pub trait EmailService: Send + Sync {
    /// Sends a plain-text or HTML email.
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: Option<&str>,
    ) -> AppResult<()>;
}

/// Port for password hashing operations.
pub trait PasswordHasher: Send + Sync {
    /// Hashes a plaintext password.
    fn hash_password(&self, password: &str) -> AppResult<String>;

    /// Verifies a plaintext password against a stored hash in constant time.
    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool>;
}

/// Port that decrypts controller QR payloads with the user's key material.
pub trait QrPayloadDecryptor: Send + Sync {
    /// Returns the plaintext JSON, or `None` when the payload cannot be decrypted.
    fn decrypt(&self, user_id: UserId, encrypted: &str) -> AppResult<Option<Vec<u8>>>;
}

/// Port for the remote controller registry.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Returns whether the controller is registered.
    async fn is_registered(&self, dev_id: &str, device_id: &str) -> AppResult<bool>;
}
