//! SMTP email service using the `lettre` crate.

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use oasreg_application::EmailService;
use oasreg_core::{AppError, AppResult};

/// SMTP email service configuration.
#[derive(Clone)]
pub struct SmtpEmailConfig {
    /// SMTP server hostname.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// SMTP username.
    pub username: String,
    /// SMTP password.
    pub password: String,
    /// Sender email address.
    pub from_address: String,
}

/// Production email service using SMTP.
#[derive(Clone)]
pub struct SmtpEmailService {
    from: Mailbox,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpEmailService {
    /// Creates a new SMTP email service.
    pub fn new(config: SmtpEmailConfig) -> AppResult<Self> {
        let from = config
            .from_address
            .parse()
            .map_err(|error| AppError::Validation(format!("invalid from address: {error}")))?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|error| {
                AppError::Internal(format!("failed to create SMTP transport: {error}"))
            })?
            .port(config.port)
            .credentials(Credentials::new(config.username, config.password))
            .build();

        Ok(Self { from, mailer })
    }
}

fn build_message(
    from: Mailbox,
    to: &str,
    subject: &str,
    text_body: &str,
    html_body: Option<&str>,
) -> AppResult<Message> {
    let to_mailbox: Mailbox = to
        .parse()
        .map_err(|error| AppError::Validation(format!("invalid recipient address: {error}")))?;

    let builder = Message::builder().from(from).to(to_mailbox).subject(subject);
    let message = match html_body {
        Some(html_body) => builder.multipart(MultiPart::alternative_plain_html(
            text_body.to_owned(),
            html_body.to_owned(),
        )),
        None => builder.body(text_body.to_owned()),
    };

    message.map_err(|error| AppError::Internal(format!("failed to build email: {error}")))
}

#[async_trait]
impl EmailService for SmtpEmailService {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: Option<&str>,
    ) -> AppResult<()> {
        let message = build_message(self.from.clone(), to, subject, text_body, html_body)?;

        self.mailer
            .send(message)
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to send email: {error}")))?;

        Ok(())
    }
}
