mod approvals;
mod collaborators;
mod users;

pub use approvals::ApprovalRepository;
pub use collaborators::{DeviceRegistry, EmailService, PasswordHasher, QrPayloadDecryptor};
pub use users::{NewUser, UserRecord, UserRepository};
