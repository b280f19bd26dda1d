//! Outbound email: templates, HTML rendering, SMTP transport, and the
//! service that logs every send against the lead.

pub mod html;
pub mod service;
pub mod smtp;
pub mod template;

pub use service::MailService;
pub use smtp::SmtpMailer;
pub use template::render_template;

use async_trait::async_trait;

use crate::error::MailError;

/// A fully rendered message ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Something that can deliver an `OutgoingEmail`.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Send the message and return its Message-ID.
    async fn send(&self, email: &OutgoingEmail) -> Result<String, MailError>;

    /// Check that the server accepts connections and credentials.
    async fn test_connection(&self) -> Result<bool, MailError>;
}
