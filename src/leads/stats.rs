//! Dashboard counters derived from leads and email logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::{EmailLog, Lead, LeadStatus};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    /// Leads created since midnight UTC.
    pub new_leads_today: usize,
    pub qualified_leads: usize,
    pub emails_sent: usize,
    pub calls_scheduled: usize,
    pub total_leads: usize,
    /// Percentage of sent emails that were opened, rounded.
    pub email_open_rate: u32,
}

impl DashboardStats {
    pub fn compute(leads: &[Lead], logs: &[EmailLog], now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        let opened = logs.iter().filter(|l| l.opened_at.is_some()).count();
        let email_open_rate = if logs.is_empty() {
            0
        } else {
            ((opened as f64 / logs.len() as f64) * 100.0).round() as u32
        };

        Self {
            new_leads_today: leads
                .iter()
                .filter(|l| l.created_at.date_naive() == today)
                .count(),
            qualified_leads: leads
                .iter()
                .filter(|l| l.status == LeadStatus::Qualified)
                .count(),
            emails_sent: logs.len(),
            calls_scheduled: leads
                .iter()
                .filter(|l| l.status == LeadStatus::Scheduled)
                .count(),
            total_leads: leads.len(),
            email_open_rate,
        }
    }
}
