//! A single form-submission row as read from the spreadsheet.

use serde::{Deserialize, Serialize};

use crate::leads::model::{NewLead, normalize_email};

/// One data row. Every field is optional on the wire; validation happens
/// when the row is turned into a lead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRow {
    /// 1-based data row position (header excluded), used only as a last-resort key.
    #[serde(default)]
    pub row_number: usize,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl SheetRow {
    /// Durable key identifying this submission across polls.
    ///
    /// `timestamp|email` when a timestamp is present (the email part may be
    /// empty), `email:<email>` when only the email is, and `row:<n>` otherwise.
    pub fn identity_key(&self) -> String {
        let email = self
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|e| !e.is_empty());
        let timestamp = self
            .timestamp
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        match (timestamp, email) {
            (Some(ts), Some(email)) => format!("{ts}|{email}"),
            (Some(ts), None) => format!("{ts}|"),
            (None, Some(email)) => format!("email:{email}"),
            (None, None) => format!("row:{}", self.row_number),
        }
    }

    /// Unvalidated lead input built from this row.
    pub fn to_new_lead(&self) -> NewLead {
        NewLead {
            name: self.name.clone().unwrap_or_default(),
            email: self.email.clone().unwrap_or_default(),
            company: self.company.clone(),
            role: self.role.clone(),
            phone: self.phone.clone(),
            source: self.source.clone(),
        }
    }
}
