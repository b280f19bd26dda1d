//! REST handlers for leads, activities, templates, settings, and sync.

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::info;

use super::{ApiError, AppState};
use crate::error::ValidationError;
use crate::leads::DashboardStats;
use crate::leads::model::{
    Activity, EmailLog, EmailTemplate, EmailTemplateUpdate, Lead, LeadUpdate, NewEmailTemplate,
    NewLead, SystemSetting,
};
use crate::pipeline::SyncReport;

const DEFAULT_ACTIVITY_LIMIT: usize = 50;
const MAX_ACTIVITY_LIMIT: usize = 500;

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Default, Deserialize)]
pub(super) struct QualifyRequest {
    #[serde(default)]
    response_text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SendEmailRequest {
    message: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ScheduleCallRequest {
    /// RFC 3339 timestamp.
    call_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ResponseRequest {
    response_text: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct SettingRequest {
    value: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ActivityQuery {
    limit: Option<usize>,
}

/// Parse a body that may be empty.
fn optional_json<T: DeserializeOwned + Default>(body: &[u8]) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::Body(e.to_string()))
}

pub(super) async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/stats
pub(super) async fn stats(State(state): State<AppState>) -> ApiResult<Json<DashboardStats>> {
    let store = state.pipeline.store();
    let leads = store.list_leads().await?;
    let logs = store.list_email_logs().await?;
    Ok(Json(DashboardStats::compute(&leads, &logs, Utc::now())))
}

// ── Leads ───────────────────────────────────────────────────────────

pub(super) async fn list_leads(State(state): State<AppState>) -> ApiResult<Json<Vec<Lead>>> {
    Ok(Json(state.pipeline.store().list_leads().await?))
}

/// POST /api/leads
///
/// Creates, qualifies, and (when SMTP is configured) welcomes the lead.
pub(super) async fn create_lead(
    State(state): State<AppState>,
    payload: Result<Json<NewLead>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Lead>)> {
    let Json(new_lead) = payload?;
    let lead = state.pipeline.onboard_lead(new_lead).await?;
    info!(lead_id = lead.id, "Lead created via API");
    Ok((StatusCode::CREATED, Json(lead)))
}

pub(super) async fn get_lead(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Lead>> {
    state
        .pipeline
        .store()
        .get_lead(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Lead {id}")))
}

pub(super) async fn update_lead(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<LeadUpdate>, JsonRejection>,
) -> ApiResult<Json<Lead>> {
    let Json(update) = payload?;
    Ok(Json(state.pipeline.update_lead(id, update).await?))
}

pub(super) async fn delete_lead(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.pipeline.delete_lead(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/leads/{id}/qualify
///
/// The body is optional; `response_text` feeds the prompt when present.
pub(super) async fn qualify_lead(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let request: QualifyRequest = optional_json(&body)?;
    let response_text = request
        .response_text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());
    let (lead, qualification) = state.pipeline.qualify_lead(id, response_text).await?;
    Ok(Json(json!({ "lead": lead, "qualification": qualification })))
}

pub(super) async fn send_email(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<SendEmailRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(request) = payload?;
    let lead = state.pipeline.follow_up(id, &request.message).await?;
    Ok(Json(json!({ "message": "Follow-up email sent", "lead": lead })))
}

pub(super) async fn schedule_call(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<ScheduleCallRequest>, JsonRejection>,
) -> ApiResult<Json<Lead>> {
    let Json(request) = payload?;
    Ok(Json(state.pipeline.schedule_call(id, request.call_at).await?))
}

/// POST /api/leads/{id}/responses
pub(super) async fn record_response(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<ResponseRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(request) = payload?;
    let (lead, analysis, qualification) = state
        .pipeline
        .record_response(id, &request.response_text)
        .await?;
    Ok(Json(json!({
        "lead": lead,
        "analysis": analysis,
        "qualification": qualification,
    })))
}

pub(super) async fn lead_activities(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<Activity>>> {
    let store = state.pipeline.store();
    if store.get_lead(id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Lead {id}")));
    }
    Ok(Json(store.list_activities_for_lead(id).await?))
}

// ── Activities ──────────────────────────────────────────────────────

/// GET /api/activities?limit=N
pub(super) async fn list_activities(
    State(state): State<AppState>,
    query: Result<Query<ActivityQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Activity>>> {
    let Query(query) = query?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
        .clamp(1, MAX_ACTIVITY_LIMIT);
    Ok(Json(state.pipeline.feed().recent(limit).await?))
}

// ── Templates ───────────────────────────────────────────────────────

pub(super) async fn list_templates(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<EmailTemplate>>> {
    Ok(Json(state.pipeline.store().list_templates().await?))
}

pub(super) async fn create_template(
    State(state): State<AppState>,
    payload: Result<Json<NewEmailTemplate>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<EmailTemplate>)> {
    let Json(template) = payload?;
    template.validate()?;
    let saved = state.pipeline.store().insert_template(&template).await?;
    info!(template_id = saved.id, is_default = saved.is_default, "Template created");
    Ok((StatusCode::CREATED, Json(saved)))
}

pub(super) async fn update_template(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<EmailTemplateUpdate>, JsonRejection>,
) -> ApiResult<Json<EmailTemplate>> {
    let Json(update) = payload?;
    for (field, value) in [
        ("name", &update.name),
        ("subject", &update.subject),
        ("body", &update.body),
    ] {
        if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
            return Err(ValidationError::MissingField(field).into());
        }
    }
    state
        .pipeline
        .store()
        .update_template(id, &update)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Template {id}")))
}

pub(super) async fn list_email_logs(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<EmailLog>>> {
    Ok(Json(state.pipeline.store().list_email_logs().await?))
}

// ── Settings ────────────────────────────────────────────────────────

pub(super) async fn get_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<SystemSetting>> {
    state
        .pipeline
        .store()
        .get_setting(&key)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Setting {key}")))
}

pub(super) async fn put_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    payload: Result<Json<SettingRequest>, JsonRejection>,
) -> ApiResult<Json<SystemSetting>> {
    let Json(request) = payload?;
    Ok(Json(
        state
            .pipeline
            .store()
            .set_setting(&key, &request.value)
            .await?,
    ))
}

// ── Status and sync ─────────────────────────────────────────────────

/// GET /api/system-status
///
/// Which integrations are configured, plus the poller's last outcome.
pub(super) async fn system_status(State(state): State<AppState>) -> impl IntoResponse {
    let pipeline = &state.pipeline;
    let database = pipeline.store().get_setting("system.ping").await.is_ok();
    let source = pipeline.source().map(|s| s.describe());

    Json(json!({
        "database": { "connected": database },
        "sheets": {
            "configured": source.is_some(),
            "source": source,
            "poll_interval_secs": state.poll_interval.map(|d| d.as_secs()),
            "poll": pipeline.poll_status().await,
        },
        "email": {
            "configured": pipeline.mail().is_configured(),
            "provider": "smtp",
        },
        "llm": {
            "configured": pipeline.qualifier().is_enabled(),
            "model": pipeline.qualifier().model_name(),
        },
        "uptime_secs": state.started_at.elapsed().as_secs(),
    }))
}

/// POST /api/sync/google-sheets
///
/// Runs one sync pass now.
pub(super) async fn sync_sheets(State(state): State<AppState>) -> ApiResult<Json<SyncReport>> {
    let report = state.pipeline.sync_once().await?;
    Ok(Json(report))
}
