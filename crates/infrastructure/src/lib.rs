//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod argon2_password_hasher;
mod console_email_service;
mod database;
mod http_device_registry;
mod in_memory_approval_repository;
mod in_memory_cooldown_repository;
mod in_memory_guard_state_repository;
mod in_memory_security_event_repository;
mod in_memory_user_repository;
mod postgres_approval_repository;
mod postgres_cooldown_repository;
mod postgres_guard_state_repository;
mod postgres_security_event_repository;
mod postgres_user_repository;
mod queued_email_service;
mod redis_cooldown_repository;
mod smtp_email_service;
mod system_clock;

pub use argon2_password_hasher::{Argon2Cost, Argon2PasswordHasher};
pub use console_email_service::ConsoleEmailService;
pub use database::{MIGRATOR, connect_and_migrate, run_migrations};
pub use http_device_registry::{
    DEFAULT_DEVICE_REGISTRY_TIMEOUT, HttpDeviceRegistry, HttpDeviceRegistryConfig,
};
pub use in_memory_approval_repository::InMemoryApprovalRepository;
pub use in_memory_cooldown_repository::InMemoryCooldownRepository;
pub use in_memory_guard_state_repository::InMemoryGuardStateRepository;
pub use in_memory_security_event_repository::InMemorySecurityEventRepository;
pub use in_memory_user_repository::InMemoryUserRepository;
pub use postgres_approval_repository::PostgresApprovalRepository;
pub use postgres_cooldown_repository::PostgresCooldownRepository;
pub use postgres_guard_state_repository::PostgresGuardStateRepository;
pub use postgres_security_event_repository::PostgresSecurityEventRepository;
pub use postgres_user_repository::PostgresUserRepository;
pub use queued_email_service::{DeliveryRetryPolicy, QueuedEmailService};
pub use redis_cooldown_repository::RedisCooldownRepository;
pub use smtp_email_service::{SmtpEmailConfig, SmtpEmailService};
pub use system_clock::SystemClock;
