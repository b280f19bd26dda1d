//! Lead data model: leads, activities, templates, and email logs.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Where a lead sits in the sales funnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    Unqualified,
    Scheduled,
    Closed,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Contacted => "contacted",
            Self::Qualified => "qualified",
            Self::Unqualified => "unqualified",
            Self::Scheduled => "scheduled",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "contacted" => Ok(Self::Contacted),
            "qualified" => Ok(Self::Qualified),
            "unqualified" => Ok(Self::Unqualified),
            "scheduled" => Ok(Self::Scheduled),
            "closed" => Ok(Self::Closed),
            other => Err(format!("unknown lead status: {other}")),
        }
    }
}

/// Default `source` for leads ingested from the spreadsheet.
pub const DEFAULT_SOURCE: &str = "google_sheets";

/// A captured contact record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: i64,
    pub name: String,
    /// Unique across leads. Stored trimmed and lowercased.
    pub email: String,
    pub company: Option<String>,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub source: String,
    pub status: LeadStatus,
    /// 0–100, set by qualification.
    pub score: i64,
    /// Last qualification result, as stored JSON.
    pub qualification_data: Option<serde_json::Value>,
    /// Last reply analysis, as stored JSON.
    pub response_data: Option<serde_json::Value>,
    pub last_contacted_at: Option<DateTime<Utc>>,
    pub scheduled_call_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Company name for copy, with a neutral fallback.
    pub fn company_or(&self, fallback: &str) -> String {
        self.company
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(fallback)
            .to_string()
    }
}

/// Input for creating a lead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewLead {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl NewLead {
    /// Trim fields, drop empty optionals, lowercase the email, and check the
    /// minimal required fields.
    pub fn validated(self) -> Result<Self, ValidationError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        let email = normalize_email(&self.email);
        if email.is_empty() {
            return Err(ValidationError::MissingField("email"));
        }
        if !is_plausible_email(&email) {
            return Err(ValidationError::InvalidEmail(email));
        }

        Ok(Self {
            name,
            email,
            company: non_empty(self.company),
            role: non_empty(self.role),
            phone: non_empty(self.phone),
            source: non_empty(self.source),
        })
    }
}

/// Partial update applied by `PATCH /api/leads/{id}` and the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeadUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub status: Option<LeadStatus>,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub qualification_data: Option<serde_json::Value>,
    #[serde(default)]
    pub response_data: Option<serde_json::Value>,
    #[serde(default)]
    pub last_contacted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scheduled_call_at: Option<DateTime<Utc>>,
}

impl LeadUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name
            && name.trim().is_empty()
        {
            return Err(ValidationError::MissingField("name"));
        }
        if let Some(score) = self.score
            && !(0..=100).contains(&score)
        {
            return Err(ValidationError::InvalidValue {
                field: "score",
                message: format!("{score} is outside 0..=100"),
            });
        }
        Ok(())
    }

    /// Apply the set fields onto `lead` and bump `updated_at`.
    pub fn apply_to(&self, lead: &mut Lead, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            lead.name = name.trim().to_string();
        }
        if let Some(company) = &self.company {
            lead.company = non_empty(Some(company.clone()));
        }
        if let Some(role) = &self.role {
            lead.role = non_empty(Some(role.clone()));
        }
        if let Some(phone) = &self.phone {
            lead.phone = non_empty(Some(phone.clone()));
        }
        if let Some(source) = &self.source {
            lead.source = source.clone();
        }
        if let Some(status) = self.status {
            lead.status = status;
        }
        if let Some(score) = self.score {
            lead.score = score;
        }
        if let Some(q) = &self.qualification_data {
            lead.qualification_data = Some(q.clone());
        }
        if let Some(r) = &self.response_data {
            lead.response_data = Some(r.clone());
        }
        if let Some(at) = self.last_contacted_at {
            lead.last_contacted_at = Some(at);
        }
        if let Some(at) = self.scheduled_call_at {
            lead.scheduled_call_at = Some(at);
        }
        lead.updated_at = now;
    }
}

/// Kind of audit-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    LeadCreated,
    LeadQualified,
    LeadUpdated,
    LeadDeleted,
    EmailSent,
    EmailResponse,
    CallScheduled,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeadCreated => "lead_created",
            Self::LeadQualified => "lead_qualified",
            Self::LeadUpdated => "lead_updated",
            Self::LeadDeleted => "lead_deleted",
            Self::EmailSent => "email_sent",
            Self::EmailResponse => "email_response",
            Self::CallScheduled => "call_scheduled",
        }
    }
}

impl FromStr for ActivityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lead_created" => Ok(Self::LeadCreated),
            "lead_qualified" => Ok(Self::LeadQualified),
            "lead_updated" => Ok(Self::LeadUpdated),
            "lead_deleted" => Ok(Self::LeadDeleted),
            "email_sent" => Ok(Self::EmailSent),
            "email_response" => Ok(Self::EmailResponse),
            "call_scheduled" => Ok(Self::CallScheduled),
            other => Err(format!("unknown activity type: {other}")),
        }
    }
}

/// Append-only audit-log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub lead_id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub description: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Input for appending an activity.
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub lead_id: Option<i64>,
    pub kind: ActivityKind,
    pub description: String,
    pub metadata: Option<serde_json::Value>,
}

impl NewActivity {
    pub fn new(lead_id: i64, kind: ActivityKind, description: impl Into<String>) -> Self {
        Self {
            lead_id: Some(lead_id),
            kind,
            description: description.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A static subject/body pair with `{{placeholder}}` substitution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub id: i64,
    pub name: String,
    pub subject: String,
    pub body: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEmailTemplate {
    pub name: String,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub is_default: bool,
}

impl NewEmailTemplate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        if self.subject.trim().is_empty() {
            return Err(ValidationError::MissingField("subject"));
        }
        if self.body.trim().is_empty() {
            return Err(ValidationError::MissingField("body"));
        }
        Ok(())
    }
}

/// Partial template update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmailTemplateUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_default: Option<bool>,
}

/// Record of one sent email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailLog {
    pub id: i64,
    pub lead_id: Option<i64>,
    pub template_id: Option<i64>,
    pub subject: String,
    pub body: String,
    pub message_id: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub opened_at: Option<DateTime<Utc>>,
    pub responded: bool,
    pub response_text: Option<String>,
}

/// Input for logging a sent email.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEmailLog {
    pub lead_id: Option<i64>,
    pub template_id: Option<i64>,
    pub subject: String,
    pub body: String,
    pub message_id: Option<String>,
}

/// Key/value system setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSetting {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Lowercase and trim an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Cheap shape check: one `@`, non-empty local part, dotted domain.
pub fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_lead() -> Lead {
        let now = Utc::now();
        Lead {
            id: 1,
            name: "Ada".into(),
            email: "ada@example.com".into(),
            company: None,
            role: None,
            phone: None,
            source: DEFAULT_SOURCE.into(),
            status: LeadStatus::New,
            score: 0,
            qualification_data: None,
            response_data: None,
            last_contacted_at: None,
            scheduled_call_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn new_lead_normalizes_fields() {
        let lead = NewLead {
            name: "  Ada Lovelace ".into(),
            email: " Ada@Example.COM ".into(),
            company: Some("  ".into()),
            role: Some(" CTO ".into()),
            ..Default::default()
        }
        .validated()
        .unwrap();

        assert_eq!(lead.name, "Ada Lovelace");
        assert_eq!(lead.email, "ada@example.com");
        assert_eq!(lead.company, None);
        assert_eq!(lead.role.as_deref(), Some("CTO"));
    }

    #[test]
    fn new_lead_requires_name_and_email() {
        let missing_name = NewLead {
            email: "a@b.co".into(),
            ..Default::default()
        };
        assert_eq!(
            missing_name.validated(),
            Err(ValidationError::MissingField("name"))
        );

        let missing_email = NewLead {
            name: "Ada".into(),
            ..Default::default()
        };
        assert_eq!(
            missing_email.validated(),
            Err(ValidationError::MissingField("email"))
        );
    }

    #[test]
    fn new_lead_rejects_malformed_email() {
        let lead = NewLead {
            name: "Ada".into(),
            email: "not-an-email".into(),
            ..Default::default()
        };
        assert!(matches!(
            lead.validated(),
            Err(ValidationError::InvalidEmail(_))
        ));
    }

    #[test]
    fn plausible_email_shapes() {
        assert!(is_plausible_email("a@b.co"));
        assert!(!is_plausible_email("a@b"));
        assert!(!is_plausible_email("@b.co"));
        assert!(!is_plausible_email("a@@b.co"));
        assert!(!is_plausible_email("a b@c.co"));
        assert!(!is_plausible_email("a@.co"));
    }

    #[test]
    fn status_string_roundtrip() {
        for status in [
            LeadStatus::New,
            LeadStatus::Contacted,
            LeadStatus::Qualified,
            LeadStatus::Unqualified,
            LeadStatus::Scheduled,
            LeadStatus::Closed,
        ] {
            assert_eq!(status.as_str().parse::<LeadStatus>().unwrap(), status);
        }
        assert!("pending".parse::<LeadStatus>().is_err());
    }

    #[test]
    fn update_applies_only_set_fields() {
        let mut lead = sample_lead();
        let before = lead.updated_at;
        let later = before + chrono::Duration::seconds(5);

        LeadUpdate {
            status: Some(LeadStatus::Contacted),
            company: Some("Acme".into()),
            ..Default::default()
        }
        .apply_to(&mut lead, later);

        assert_eq!(lead.status, LeadStatus::Contacted);
        assert_eq!(lead.company.as_deref(), Some("Acme"));
        assert_eq!(lead.name, "Ada");
        assert_eq!(lead.updated_at, later);
    }

    #[test]
    fn update_rejects_out_of_range_score() {
        let update = LeadUpdate {
            score: Some(101),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn update_rejects_unknown_fields() {
        let result = serde_json::from_str::<LeadUpdate>(r#"{"email": "x@y.z"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn activity_serializes_type_tag() {
        let activity = Activity {
            id: 3,
            lead_id: Some(1),
            kind: ActivityKind::LeadCreated,
            description: "New lead".into(),
            metadata: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&activity).unwrap();
        assert_eq!(json["type"], "lead_created");
    }

    #[test]
    fn company_fallback() {
        let mut lead = sample_lead();
        assert_eq!(lead.company_or("your company"), "your company");
        lead.company = Some("Acme".into());
        assert_eq!(lead.company_or("your company"), "Acme");
    }
}
