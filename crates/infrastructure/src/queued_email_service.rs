//! Background email delivery with bounded retries.
//!
//! Callers only enqueue. Delivery is at-least-once and failures never reach
//! the guarded flow, whose stored verification code stays the source of truth.
//! A message that is finally dropped leaves an `EmailDeliveryFailed` event.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use oasreg_application::{EmailService, SecurityEvent, SecurityEventService, SecurityEventType};
use oasreg_core::{AppError, AppResult};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Retry schedule for queued deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryRetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Pause before each retry.
    pub backoff: Duration,
}

impl Default for DeliveryRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
struct OutgoingEmail {
    to: String,
    subject: String,
    text_body: String,
    html_body: Option<String>,
}

/// Email service that hands messages to a background delivery task.
#[derive(Clone)]
pub struct QueuedEmailService {
    sender: mpsc::UnboundedSender<OutgoingEmail>,
}

impl QueuedEmailService {
    /// Starts the delivery task over `transport`.
    ///
    /// The task ends once every clone of the returned service is dropped and
    /// in-flight deliveries have been handed off.
    #[must_use]
    pub fn spawn(
        transport: Arc<dyn EmailService>,
        policy: DeliveryRetryPolicy,
        security_events: SecurityEventService,
    ) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<OutgoingEmail>();

        let handle = tokio::spawn(async move {
            while let Some(email) = receiver.recv().await {
                tokio::spawn(deliver(
                    Arc::clone(&transport),
                    security_events.clone(),
                    email,
                    policy,
                ));
            }
        });

        (Self { sender }, handle)
    }
}

async fn deliver(
    transport: Arc<dyn EmailService>,
    security_events: SecurityEventService,
    email: OutgoingEmail,
    policy: DeliveryRetryPolicy,
) {
    let mut attempt = 0_u32;

    loop {
        let result = transport
            .send_email(
                &email.to,
                &email.subject,
                &email.text_body,
                email.html_body.as_deref(),
            )
            .await;

        match result {
            Ok(()) => {
                info!(to = %email.to, attempt, "email delivered");
                return;
            }
            Err(delivery_error) if delivery_error.is_transient() && attempt < policy.max_retries => {
                attempt = attempt.saturating_add(1);
                warn!(
                    to = %email.to,
                    attempt,
                    error = %delivery_error,
                    "email delivery failed, retrying"
                );
                tokio::time::sleep(policy.backoff).await;
            }
            Err(delivery_error) => {
                security_events
                    .record_event(SecurityEvent::unattributed(
                        SecurityEventType::EmailDeliveryFailed,
                        format!(
                            "gave up delivering '{}' to {} after {} attempts: {delivery_error}",
                            email.subject,
                            email.to,
                            attempt.saturating_add(1)
                        ),
                    ))
                    .await;
                return;
            }
        }
    }
}

#[async_trait]
impl EmailService for QueuedEmailService {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: Option<&str>,
    ) -> AppResult<()> {
        self.sender
            .send(OutgoingEmail {
                to: to.to_owned(),
                subject: subject.to_owned(),
                text_body: text_body.to_owned(),
                html_body: html_body.map(str::to_owned),
            })
            .map_err(|_| AppError::Unavailable("email delivery queue is closed".to_owned()))
    }
}
