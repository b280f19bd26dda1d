//! `LeadStore` trait: single async interface for all persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;
use crate::leads::model::{
    Activity, EmailLog, EmailTemplate, EmailTemplateUpdate, Lead, LeadUpdate, NewActivity,
    NewEmailLog, NewEmailTemplate, NewLead, SystemSetting,
};

/// Backend-agnostic repository covering leads, activities, templates, email
/// logs, settings, and the poller's seen-row keys.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Create tables and seed defaults. Idempotent.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Leads ───────────────────────────────────────────────────────

    /// All leads, newest first.
    async fn list_leads(&self) -> Result<Vec<Lead>, DatabaseError>;

    async fn get_lead(&self, id: i64) -> Result<Option<Lead>, DatabaseError>;

    /// Exact match on the normalized email.
    async fn get_lead_by_email(&self, email: &str) -> Result<Option<Lead>, DatabaseError>;

    /// Insert a validated lead. A duplicate email yields `DatabaseError::Constraint`.
    async fn insert_lead(&self, lead: &NewLead) -> Result<Lead, DatabaseError>;

    /// Apply a partial update. Returns `None` if the lead does not exist.
    async fn update_lead(&self, id: i64, update: &LeadUpdate) -> Result<Option<Lead>, DatabaseError>;

    /// Delete a lead. Returns whether a row was removed.
    async fn delete_lead(&self, id: i64) -> Result<bool, DatabaseError>;

    // ── Activities ──────────────────────────────────────────────────

    async fn insert_activity(&self, activity: &NewActivity) -> Result<Activity, DatabaseError>;

    /// Most recent activities first, up to `limit`.
    async fn list_activities(&self, limit: usize) -> Result<Vec<Activity>, DatabaseError>;

    async fn list_activities_for_lead(&self, lead_id: i64) -> Result<Vec<Activity>, DatabaseError>;

    // ── Templates ───────────────────────────────────────────────────

    async fn list_templates(&self) -> Result<Vec<EmailTemplate>, DatabaseError>;

    async fn get_template(&self, id: i64) -> Result<Option<EmailTemplate>, DatabaseError>;

    async fn get_default_template(&self) -> Result<Option<EmailTemplate>, DatabaseError>;

    /// Insert a template. Marking it default clears the flag elsewhere.
    async fn insert_template(
        &self,
        template: &NewEmailTemplate,
    ) -> Result<EmailTemplate, DatabaseError>;

    async fn update_template(
        &self,
        id: i64,
        update: &EmailTemplateUpdate,
    ) -> Result<Option<EmailTemplate>, DatabaseError>;

    // ── Email logs ──────────────────────────────────────────────────

    async fn insert_email_log(&self, log: &NewEmailLog) -> Result<EmailLog, DatabaseError>;

    /// All email logs, newest first.
    async fn list_email_logs(&self) -> Result<Vec<EmailLog>, DatabaseError>;

    /// Most recent log sent to a lead.
    async fn latest_email_log_for_lead(
        &self,
        lead_id: i64,
    ) -> Result<Option<EmailLog>, DatabaseError>;

    /// Mark a log as responded with the reply text.
    async fn mark_email_responded(&self, id: i64, response_text: &str) -> Result<(), DatabaseError>;

    async fn mark_email_opened(&self, id: i64, at: DateTime<Utc>) -> Result<(), DatabaseError>;

    // ── Settings ────────────────────────────────────────────────────

    async fn get_setting(&self, key: &str) -> Result<Option<SystemSetting>, DatabaseError>;

    async fn set_setting(&self, key: &str, value: &str) -> Result<SystemSetting, DatabaseError>;

    // ── Sheet rows ──────────────────────────────────────────────────

    /// Every recorded row identity key.
    async fn seen_row_keys(&self) -> Result<Vec<String>, DatabaseError>;

    /// Record a row key. Returns `false` if it was already recorded.
    async fn record_seen_row(&self, key: &str) -> Result<bool, DatabaseError>;
}
