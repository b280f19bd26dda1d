//! Mail service: renders templates, sends, and records the result.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::info;

use super::html::text_to_html;
use super::template::render_template;
use super::{MailTransport, OutgoingEmail};
use crate::error::MailError;
use crate::leads::ActivityFeed;
use crate::leads::model::{
    ActivityKind, EmailLog, Lead, LeadStatus, LeadUpdate, NewActivity, NewEmailLog,
};
use crate::qualify::Qualifier;
use crate::store::LeadStore;

/// Sends lead emails and keeps the log, activity feed, and lead in step.
#[derive(Clone)]
pub struct MailService {
    store: Arc<dyn LeadStore>,
    feed: ActivityFeed,
    transport: Option<Arc<dyn MailTransport>>,
    qualifier: Qualifier,
    personalize: bool,
}

impl MailService {
    pub fn new(
        store: Arc<dyn LeadStore>,
        feed: ActivityFeed,
        transport: Option<Arc<dyn MailTransport>>,
    ) -> Self {
        Self {
            store,
            feed,
            transport,
            qualifier: Qualifier::disabled(),
            personalize: false,
        }
    }

    /// Let the qualifier's model rewrite welcome bodies before sending.
    pub fn with_personalization(mut self, qualifier: Qualifier) -> Self {
        self.personalize = qualifier.is_enabled();
        self.qualifier = qualifier;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.transport.is_some()
    }

    fn transport(&self) -> Result<&Arc<dyn MailTransport>, MailError> {
        self.transport.as_ref().ok_or(MailError::NotConfigured)
    }

    pub async fn test_connection(&self) -> Result<bool, MailError> {
        self.transport()?.test_connection().await
    }

    /// Send the default welcome template to a lead.
    ///
    /// Moves a `new` lead to `contacted` and stamps `last_contacted_at`.
    pub async fn send_welcome(&self, lead: &Lead) -> Result<EmailLog, MailError> {
        let transport = self.transport()?;
        let template = self
            .store
            .get_default_template()
            .await?
            .ok_or(MailError::NoDefaultTemplate)?;

        let subject = render_template(&template.subject, lead);
        let body = if self.personalize {
            self.qualifier.personalize(lead, &template.body).await
        } else {
            render_template(&template.body, lead)
        };

        let message_id = transport.send(&outgoing(lead, &subject, &body)).await?;

        let log = self
            .store
            .insert_email_log(&NewEmailLog {
                lead_id: Some(lead.id),
                template_id: Some(template.id),
                subject: subject.clone(),
                body,
                message_id: Some(message_id.clone()),
            })
            .await?;

        self.feed
            .record_quietly(
                NewActivity::new(
                    lead.id,
                    ActivityKind::EmailSent,
                    format!("Welcome email sent to {}", lead.name),
                )
                .with_metadata(json!({ "email_id": message_id, "subject": subject })),
            )
            .await;

        let update = LeadUpdate {
            status: (lead.status == LeadStatus::New).then_some(LeadStatus::Contacted),
            last_contacted_at: Some(Utc::now()),
            ..Default::default()
        };
        self.store.update_lead(lead.id, &update).await?;

        info!(lead_id = lead.id, to = %lead.email, "Welcome email sent");
        Ok(log)
    }

    /// Send a free-form follow-up message.
    pub async fn send_follow_up(&self, lead: &Lead, message: &str) -> Result<EmailLog, MailError> {
        let transport = self.transport()?;
        let subject = format!("Following up - {}", lead.company_or("Your Business"));

        let message_id = transport.send(&outgoing(lead, &subject, message)).await?;

        let log = self
            .store
            .insert_email_log(&NewEmailLog {
                lead_id: Some(lead.id),
                template_id: None,
                subject: subject.clone(),
                body: message.to_string(),
                message_id: Some(message_id.clone()),
            })
            .await?;

        self.feed
            .record_quietly(
                NewActivity::new(
                    lead.id,
                    ActivityKind::EmailSent,
                    format!("Follow-up email sent to {}", lead.name),
                )
                .with_metadata(json!({ "email_id": message_id, "subject": subject })),
            )
            .await;

        self.store
            .update_lead(
                lead.id,
                &LeadUpdate {
                    last_contacted_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?;

        info!(lead_id = lead.id, to = %lead.email, "Follow-up email sent");
        Ok(log)
    }
}

fn outgoing(lead: &Lead, subject: &str, body: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: lead.email.clone(),
        to_name: Some(lead.name.clone()),
        subject: subject.to_string(),
        text: body.to_string(),
        html: text_to_html(body),
    }
}
