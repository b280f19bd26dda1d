//! libSQL backend: async `LeadStore` trait implementation.
//!
//! Supports local file and in-memory databases. All timestamps are written
//! as RFC 3339 text.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info, warn};

use crate::error::DatabaseError;
use crate::leads::model::{
    Activity, DEFAULT_SOURCE, EmailLog, EmailTemplate, EmailTemplateUpdate, Lead, LeadUpdate,
    NewActivity, NewEmailLog, NewEmailTemplate, NewLead, SystemSetting,
};
use crate::mail::template::{DEFAULT_TEMPLATE_NAME, DEFAULT_WELCOME_BODY, DEFAULT_WELCOME_SUBJECT};
use crate::store::migrations;
use crate::store::traits::LeadStore;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and initialize the schema.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db).await?;
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db).await?;
        backend.init_schema().await?;
        Ok(backend)
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        // SQLite leaves foreign keys off per connection; ON DELETE SET NULL needs them.
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to enable foreign keys: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run a query expected to return at most one row and map it.
    async fn query_one<T>(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
        what: &str,
        map: fn(&libsql::Row) -> Result<T, DatabaseError>,
    ) -> Result<Option<T>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("{what}: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => map(&row).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("{what}: {e}"))),
        }
    }

    /// Run a query and map every row, skipping rows that fail to parse.
    async fn query_all<T>(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
        what: &str,
        map: fn(&libsql::Row) -> Result<T, DatabaseError>,
    ) -> Result<Vec<T>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("{what}: {e}")))?;

        let mut items = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => match map(&row) {
                    Ok(item) => items.push(item),
                    Err(e) => warn!("Skipping {what} row: {e}"),
                },
                Ok(None) => break,
                Err(e) => return Err(DatabaseError::Query(format!("{what}: {e}"))),
            }
        }
        Ok(items)
    }

    /// Insert with `RETURNING id` and hand back the new row id.
    async fn insert_returning_id(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
        what: &str,
    ) -> Result<i64, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| map_write_error(what, e))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<i64>(0)
                .map_err(|e| DatabaseError::Query(format!("{what} id: {e}"))),
            Ok(None) => Err(DatabaseError::Query(format!("{what}: no id returned"))),
            Err(e) => Err(map_write_error(what, e)),
        }
    }

    async fn seed_default_template(&self) -> Result<(), DatabaseError> {
        let existing = self
            .query_one(
                "SELECT COUNT(*) FROM email_templates",
                (),
                "count_templates",
                |row| {
                    row.get::<i64>(0)
                        .map_err(|e| DatabaseError::Query(format!("count: {e}")))
                },
            )
            .await?
            .unwrap_or(0);

        if existing == 0 {
            self.insert_template(&NewEmailTemplate {
                name: DEFAULT_TEMPLATE_NAME.to_string(),
                subject: DEFAULT_WELCOME_SUBJECT.to_string(),
                body: DEFAULT_WELCOME_BODY.to_string(),
                is_default: true,
            })
            .await?;
            info!("Seeded default welcome template");
        }
        Ok(())
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_ref().map(|s| parse_datetime(s))
}

fn parse_optional_json(s: Option<String>) -> Option<serde_json::Value> {
    s.and_then(|s| serde_json::from_str(&s).ok())
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn opt_int(v: Option<i64>) -> libsql::Value {
    match v {
        Some(v) => libsql::Value::Integer(v),
        None => libsql::Value::Null,
    }
}

fn opt_json(v: Option<&serde_json::Value>) -> libsql::Value {
    match v {
        Some(v) => libsql::Value::Text(v.to_string()),
        None => libsql::Value::Null,
    }
}

fn opt_datetime(v: Option<DateTime<Utc>>) -> libsql::Value {
    match v {
        Some(v) => libsql::Value::Text(v.to_rfc3339()),
        None => libsql::Value::Null,
    }
}

/// UNIQUE violations become `Constraint` so callers can tell duplicates apart.
fn map_write_error(what: &str, e: libsql::Error) -> DatabaseError {
    let message = e.to_string();
    if message.contains("UNIQUE constraint failed") {
        DatabaseError::Constraint(format!("{what}: {message}"))
    } else {
        DatabaseError::Query(format!("{what}: {message}"))
    }
}

fn text(row: &libsql::Row, idx: i32, name: &str) -> Result<String, DatabaseError> {
    row.get::<String>(idx)
        .map_err(|e| DatabaseError::Query(format!("{name}: {e}")))
}

fn int(row: &libsql::Row, idx: i32, name: &str) -> Result<i64, DatabaseError> {
    row.get::<i64>(idx)
        .map_err(|e| DatabaseError::Query(format!("{name}: {e}")))
}

const LEAD_COLUMNS: &str = "id, name, email, company, role, phone, source, status, score, qualification_data, response_data, last_contacted_at, scheduled_call_at, created_at, updated_at";

const ACTIVITY_COLUMNS: &str = "id, lead_id, type, description, metadata, created_at";

const TEMPLATE_COLUMNS: &str = "id, name, subject, body, is_default, created_at";

const EMAIL_LOG_COLUMNS: &str = "id, lead_id, template_id, subject, body, message_id, sent_at, opened_at, responded, response_text";

/// Map a libsql Row to a Lead. Column order matches LEAD_COLUMNS.
fn row_to_lead(row: &libsql::Row) -> Result<Lead, DatabaseError> {
    let status_str: String = text(row, 7, "lead.status")?;
    let created_str: String = text(row, 13, "lead.created_at")?;
    let updated_str: String = text(row, 14, "lead.updated_at")?;

    Ok(Lead {
        id: int(row, 0, "lead.id")?,
        name: text(row, 1, "lead.name")?,
        email: text(row, 2, "lead.email")?,
        company: row.get(3).ok(),
        role: row.get(4).ok(),
        phone: row.get(5).ok(),
        source: row
            .get::<String>(6)
            .unwrap_or_else(|_| DEFAULT_SOURCE.to_string()),
        status: status_str
            .parse()
            .map_err(DatabaseError::Serialization)?,
        score: row.get(8).unwrap_or(0),
        qualification_data: parse_optional_json(row.get(9).ok()),
        response_data: parse_optional_json(row.get(10).ok()),
        last_contacted_at: parse_optional_datetime(&row.get(11).ok()),
        scheduled_call_at: parse_optional_datetime(&row.get(12).ok()),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

fn row_to_activity(row: &libsql::Row) -> Result<Activity, DatabaseError> {
    let kind_str: String = text(row, 2, "activity.type")?;
    let created_str: String = text(row, 5, "activity.created_at")?;

    Ok(Activity {
        id: int(row, 0, "activity.id")?,
        lead_id: row.get(1).ok(),
        kind: kind_str.parse().map_err(DatabaseError::Serialization)?,
        description: text(row, 3, "activity.description")?,
        metadata: parse_optional_json(row.get(4).ok()),
        created_at: parse_datetime(&created_str),
    })
}

fn row_to_template(row: &libsql::Row) -> Result<EmailTemplate, DatabaseError> {
    let created_str: String = text(row, 5, "template.created_at")?;
    Ok(EmailTemplate {
        id: int(row, 0, "template.id")?,
        name: text(row, 1, "template.name")?,
        subject: text(row, 2, "template.subject")?,
        body: text(row, 3, "template.body")?,
        is_default: row.get::<i64>(4).unwrap_or(0) != 0,
        created_at: parse_datetime(&created_str),
    })
}

fn row_to_email_log(row: &libsql::Row) -> Result<EmailLog, DatabaseError> {
    let sent_str: String = text(row, 6, "email_log.sent_at")?;
    Ok(EmailLog {
        id: int(row, 0, "email_log.id")?,
        lead_id: row.get(1).ok(),
        template_id: row.get(2).ok(),
        subject: text(row, 3, "email_log.subject")?,
        body: text(row, 4, "email_log.body")?,
        message_id: row.get(5).ok(),
        sent_at: parse_datetime(&sent_str),
        opened_at: parse_optional_datetime(&row.get(7).ok()),
        responded: row.get::<i64>(8).unwrap_or(0) != 0,
        response_text: row.get(9).ok(),
    })
}

fn row_to_setting(row: &libsql::Row) -> Result<SystemSetting, DatabaseError> {
    let updated_str: String = text(row, 2, "setting.updated_at")?;
    Ok(SystemSetting {
        key: text(row, 0, "setting.key")?,
        value: text(row, 1, "setting.value")?,
        updated_at: parse_datetime(&updated_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl LeadStore for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await?;
        self.seed_default_template().await
    }

    // ── Leads ───────────────────────────────────────────────────────

    async fn list_leads(&self) -> Result<Vec<Lead>, DatabaseError> {
        self.query_all(
            &format!("SELECT {LEAD_COLUMNS} FROM leads ORDER BY created_at DESC, id DESC"),
            (),
            "list_leads",
            row_to_lead,
        )
        .await
    }

    async fn get_lead(&self, id: i64) -> Result<Option<Lead>, DatabaseError> {
        self.query_one(
            &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1"),
            params![id],
            "get_lead",
            row_to_lead,
        )
        .await
    }

    async fn get_lead_by_email(&self, email: &str) -> Result<Option<Lead>, DatabaseError> {
        self.query_one(
            &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE email = ?1"),
            params![email],
            "get_lead_by_email",
            row_to_lead,
        )
        .await
    }

    async fn insert_lead(&self, lead: &NewLead) -> Result<Lead, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let id = self
            .insert_returning_id(
                "INSERT INTO leads (name, email, company, role, phone, source, status, score, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'new', 0, ?7, ?7) RETURNING id",
                params![
                    lead.name.as_str(),
                    lead.email.as_str(),
                    opt_text(lead.company.as_deref()),
                    opt_text(lead.role.as_deref()),
                    opt_text(lead.phone.as_deref()),
                    lead.source.as_deref().unwrap_or(DEFAULT_SOURCE),
                    now,
                ],
                "insert_lead",
            )
            .await?;

        debug!(lead_id = id, email = %lead.email, "Lead inserted into DB");
        self.get_lead(id).await?.ok_or_else(|| DatabaseError::NotFound {
            entity: "lead".to_string(),
            id: id.to_string(),
        })
    }

    async fn update_lead(&self, id: i64, update: &LeadUpdate) -> Result<Option<Lead>, DatabaseError> {
        let Some(mut lead) = self.get_lead(id).await? else {
            return Ok(None);
        };
        update.apply_to(&mut lead, Utc::now());

        self.conn()
            .execute(
                "UPDATE leads SET name = ?1, company = ?2, role = ?3, phone = ?4, source = ?5, status = ?6, score = ?7, qualification_data = ?8, response_data = ?9, last_contacted_at = ?10, scheduled_call_at = ?11, updated_at = ?12 WHERE id = ?13",
                params![
                    lead.name.as_str(),
                    opt_text(lead.company.as_deref()),
                    opt_text(lead.role.as_deref()),
                    opt_text(lead.phone.as_deref()),
                    lead.source.as_str(),
                    lead.status.as_str(),
                    lead.score,
                    opt_json(lead.qualification_data.as_ref()),
                    opt_json(lead.response_data.as_ref()),
                    opt_datetime(lead.last_contacted_at),
                    opt_datetime(lead.scheduled_call_at),
                    lead.updated_at.to_rfc3339(),
                    id,
                ],
            )
            .await
            .map_err(|e| map_write_error("update_lead", e))?;

        debug!(lead_id = id, status = %lead.status, "Lead updated in DB");
        Ok(Some(lead))
    }

    async fn delete_lead(&self, id: i64) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute("DELETE FROM leads WHERE id = ?1", params![id])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_lead: {e}")))?;
        Ok(affected > 0)
    }

    // ── Activities ──────────────────────────────────────────────────

    async fn insert_activity(&self, activity: &NewActivity) -> Result<Activity, DatabaseError> {
        let now = Utc::now();
        let id = self
            .insert_returning_id(
                "INSERT INTO activities (lead_id, type, description, metadata, created_at) VALUES (?1, ?2, ?3, ?4, ?5) RETURNING id",
                params![
                    opt_int(activity.lead_id),
                    activity.kind.as_str(),
                    activity.description.as_str(),
                    opt_json(activity.metadata.as_ref()),
                    now.to_rfc3339(),
                ],
                "insert_activity",
            )
            .await?;

        Ok(Activity {
            id,
            lead_id: activity.lead_id,
            kind: activity.kind,
            description: activity.description.clone(),
            metadata: activity.metadata.clone(),
            created_at: now,
        })
    }

    async fn list_activities(&self, limit: usize) -> Result<Vec<Activity>, DatabaseError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_all(
            &format!(
                "SELECT {ACTIVITY_COLUMNS} FROM activities ORDER BY created_at DESC, id DESC LIMIT ?1"
            ),
            params![limit],
            "list_activities",
            row_to_activity,
        )
        .await
    }

    async fn list_activities_for_lead(&self, lead_id: i64) -> Result<Vec<Activity>, DatabaseError> {
        self.query_all(
            &format!(
                "SELECT {ACTIVITY_COLUMNS} FROM activities WHERE lead_id = ?1 ORDER BY created_at DESC, id DESC"
            ),
            params![lead_id],
            "list_activities_for_lead",
            row_to_activity,
        )
        .await
    }

    // ── Templates ───────────────────────────────────────────────────

    async fn list_templates(&self) -> Result<Vec<EmailTemplate>, DatabaseError> {
        self.query_all(
            &format!("SELECT {TEMPLATE_COLUMNS} FROM email_templates ORDER BY id ASC"),
            (),
            "list_templates",
            row_to_template,
        )
        .await
    }

    async fn get_template(&self, id: i64) -> Result<Option<EmailTemplate>, DatabaseError> {
        self.query_one(
            &format!("SELECT {TEMPLATE_COLUMNS} FROM email_templates WHERE id = ?1"),
            params![id],
            "get_template",
            row_to_template,
        )
        .await
    }

    async fn get_default_template(&self) -> Result<Option<EmailTemplate>, DatabaseError> {
        self.query_one(
            &format!(
                "SELECT {TEMPLATE_COLUMNS} FROM email_templates WHERE is_default = 1 ORDER BY id ASC LIMIT 1"
            ),
            (),
            "get_default_template",
            row_to_template,
        )
        .await
    }

    async fn insert_template(
        &self,
        template: &NewEmailTemplate,
    ) -> Result<EmailTemplate, DatabaseError> {
        if template.is_default {
            self.conn()
                .execute("UPDATE email_templates SET is_default = 0", ())
                .await
                .map_err(|e| DatabaseError::Query(format!("clear default template: {e}")))?;
        }

        let now = Utc::now();
        let id = self
            .insert_returning_id(
                "INSERT INTO email_templates (name, subject, body, is_default, created_at) VALUES (?1, ?2, ?3, ?4, ?5) RETURNING id",
                params![
                    template.name.as_str(),
                    template.subject.as_str(),
                    template.body.as_str(),
                    i64::from(template.is_default),
                    now.to_rfc3339(),
                ],
                "insert_template",
            )
            .await?;

        Ok(EmailTemplate {
            id,
            name: template.name.clone(),
            subject: template.subject.clone(),
            body: template.body.clone(),
            is_default: template.is_default,
            created_at: now,
        })
    }

    async fn update_template(
        &self,
        id: i64,
        update: &EmailTemplateUpdate,
    ) -> Result<Option<EmailTemplate>, DatabaseError> {
        let Some(mut template) = self.get_template(id).await? else {
            return Ok(None);
        };

        if let Some(name) = &update.name {
            template.name = name.clone();
        }
        if let Some(subject) = &update.subject {
            template.subject = subject.clone();
        }
        if let Some(body) = &update.body {
            template.body = body.clone();
        }
        if let Some(is_default) = update.is_default {
            if is_default && !template.is_default {
                self.conn()
                    .execute("UPDATE email_templates SET is_default = 0", ())
                    .await
                    .map_err(|e| DatabaseError::Query(format!("clear default template: {e}")))?;
            }
            template.is_default = is_default;
        }

        self.conn()
            .execute(
                "UPDATE email_templates SET name = ?1, subject = ?2, body = ?3, is_default = ?4 WHERE id = ?5",
                params![
                    template.name.as_str(),
                    template.subject.as_str(),
                    template.body.as_str(),
                    i64::from(template.is_default),
                    id,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_template: {e}")))?;

        Ok(Some(template))
    }

    // ── Email logs ──────────────────────────────────────────────────

    async fn insert_email_log(&self, log: &NewEmailLog) -> Result<EmailLog, DatabaseError> {
        let now = Utc::now();
        let id = self
            .insert_returning_id(
                "INSERT INTO email_sent_log (lead_id, template_id, subject, body, message_id, sent_at, responded) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0) RETURNING id",
                params![
                    opt_int(log.lead_id),
                    opt_int(log.template_id),
                    log.subject.as_str(),
                    log.body.as_str(),
                    opt_text(log.message_id.as_deref()),
                    now.to_rfc3339(),
                ],
                "insert_email_log",
            )
            .await?;

        Ok(EmailLog {
            id,
            lead_id: log.lead_id,
            template_id: log.template_id,
            subject: log.subject.clone(),
            body: log.body.clone(),
            message_id: log.message_id.clone(),
            sent_at: now,
            opened_at: None,
            responded: false,
            response_text: None,
        })
    }

    async fn list_email_logs(&self) -> Result<Vec<EmailLog>, DatabaseError> {
        self.query_all(
            &format!("SELECT {EMAIL_LOG_COLUMNS} FROM email_sent_log ORDER BY sent_at DESC, id DESC"),
            (),
            "list_email_logs",
            row_to_email_log,
        )
        .await
    }

    async fn latest_email_log_for_lead(
        &self,
        lead_id: i64,
    ) -> Result<Option<EmailLog>, DatabaseError> {
        self.query_one(
            &format!(
                "SELECT {EMAIL_LOG_COLUMNS} FROM email_sent_log WHERE lead_id = ?1 ORDER BY sent_at DESC, id DESC LIMIT 1"
            ),
            params![lead_id],
            "latest_email_log_for_lead",
            row_to_email_log,
        )
        .await
    }

    async fn mark_email_responded(&self, id: i64, response_text: &str) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE email_sent_log SET responded = 1, response_text = ?1 WHERE id = ?2",
                params![response_text, id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("mark_email_responded: {e}")))?;
        Ok(())
    }

    async fn mark_email_opened(&self, id: i64, at: DateTime<Utc>) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE email_sent_log SET opened_at = COALESCE(opened_at, ?1) WHERE id = ?2",
                params![at.to_rfc3339(), id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("mark_email_opened: {e}")))?;
        Ok(())
    }

    // ── Settings ────────────────────────────────────────────────────

    async fn get_setting(&self, key: &str) -> Result<Option<SystemSetting>, DatabaseError> {
        self.query_one(
            "SELECT key, value, updated_at FROM system_settings WHERE key = ?1",
            params![key],
            "get_setting",
            row_to_setting,
        )
        .await
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<SystemSetting, DatabaseError> {
        let now = Utc::now();
        self.conn()
            .execute(
                "INSERT INTO system_settings (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now.to_rfc3339()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_setting: {e}")))?;

        Ok(SystemSetting {
            key: key.to_string(),
            value: value.to_string(),
            updated_at: now,
        })
    }

    // ── Sheet rows ──────────────────────────────────────────────────

    async fn seen_row_keys(&self) -> Result<Vec<String>, DatabaseError> {
        self.query_all("SELECT row_key FROM sheet_rows", (), "seen_row_keys", |row| {
            text(row, 0, "sheet_rows.row_key")
        })
        .await
    }

    async fn record_seen_row(&self, key: &str) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "INSERT OR IGNORE INTO sheet_rows (row_key) VALUES (?1)",
                params![key],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("record_seen_row: {e}")))?;
        Ok(affected > 0)
    }
}
