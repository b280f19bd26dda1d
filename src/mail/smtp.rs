//! SMTP transport via lettre.
//!
//! lettre's `SmtpTransport` is blocking, so every network call runs on
//! `spawn_blocking`.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;
use tracing::{debug, info};

use super::{MailTransport, OutgoingEmail};
use crate::config::{SmtpConfig, SmtpTls};
use crate::error::MailError;

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
    /// Domain used for generated Message-IDs.
    domain: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let creds = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );

        let builder = match config.tls {
            SmtpTls::StartTls => SmtpTransport::starttls_relay(&config.host)
                .map_err(|e| MailError::Build(format!("SMTP relay error: {e}")))?,
            SmtpTls::Wrapper => SmtpTransport::relay(&config.host)
                .map_err(|e| MailError::Build(format!("SMTP relay error: {e}")))?,
            SmtpTls::None => SmtpTransport::builder_dangerous(&config.host),
        };

        let transport = builder
            .port(config.port)
            .credentials(creds)
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        let address = parse_address(&config.from_address)?;
        let domain = address.domain().to_string();
        let from = Mailbox::new(Some(config.from_name.clone()), address);

        info!(host = %config.host, port = config.port, tls = ?config.tls, "SMTP transport configured");
        Ok(Self {
            transport,
            from,
            domain,
        })
    }

    fn build_message(&self, email: &OutgoingEmail, message_id: &str) -> Result<Message, MailError> {
        let to = Mailbox::new(email.to_name.clone(), parse_address(&email.to)?);

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.clone())
            .message_id(Some(message_id.to_string()))
            .multipart(MultiPart::alternative_plain_html(
                email.text.clone(),
                email.html.clone(),
            ))
            .map_err(|e| MailError::Build(e.to_string()))
    }
}

fn parse_address(address: &str) -> Result<Address, MailError> {
    address
        .trim()
        .parse::<Address>()
        .map_err(|e| MailError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, MailError> {
        let message_id = format!("<{}@{}>", uuid::Uuid::new_v4(), self.domain);
        let message = self.build_message(email, &message_id)?;
        let transport = self.transport.clone();

        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| MailError::Send(format!("SMTP task failed: {e}")))?
            .map_err(|e| MailError::Send(e.to_string()))?;

        debug!(to = %email.to, message_id = %message_id, "Email sent");
        Ok(message_id)
    }

    async fn test_connection(&self) -> Result<bool, MailError> {
        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || transport.test_connection())
            .await
            .map_err(|e| MailError::Send(format!("SMTP task failed: {e}")))?
            .map_err(|e| MailError::Send(e.to_string()))
    }
}
