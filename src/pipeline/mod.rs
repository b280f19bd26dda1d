//! Lead pipeline: turns sheet rows and API calls into leads, qualifies
//! them, and sends the welcome email.
//!
//! ```text
//! sheet rows ─▶ RowTracker::diff ─▶ ingest_row ─▶ create_lead ─▶ qualify
//!                                                              ─▶ send_welcome
//!                                                              ─▶ apply status/score
//! ```

mod ingest;
pub mod poller;

pub use poller::spawn_sheet_poller;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::error::{DatabaseError, PipelineError, ValidationError};
use crate::leads::ActivityFeed;
use crate::leads::model::{
    ActivityKind, Lead, LeadStatus, LeadUpdate, NewActivity, NewLead,
};
use crate::mail::MailService;
use crate::qualify::{Qualification, Qualifier, ResponseAnalysis};
use crate::sheets::{RowTracker, SheetSource};
use crate::store::LeadStore;

/// Counters for one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Rows returned by the source.
    pub fetched: usize,
    /// Rows not seen before.
    pub new_rows: usize,
    pub created: usize,
    pub duplicates: usize,
    pub invalid: usize,
    /// Rows left unrecorded after a store failure; retried next pass.
    pub failed: usize,
    /// Rows marked seen without ingestion on the first pass.
    pub baselined: usize,
}

/// What happened to a single sheet row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RowOutcome {
    Created { lead_id: i64 },
    Duplicate { email: String },
    Invalid { reason: String },
    Failed { reason: String },
}

impl RowOutcome {
    /// Whether the row's key should be recorded as seen.
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Poller health, surfaced by `/api/system-status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollStatus {
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_report: Option<SyncReport>,
}

/// Orchestrates lead creation, qualification, and outreach.
pub struct LeadPipeline {
    store: Arc<dyn LeadStore>,
    feed: ActivityFeed,
    qualifier: Qualifier,
    mail: MailService,
    source: Option<Arc<dyn SheetSource>>,
    baseline_existing: bool,
    /// Held for the duration of a sync, so ticks and manual syncs never overlap.
    tracker: Mutex<Option<RowTracker>>,
    status: RwLock<PollStatus>,
}

impl LeadPipeline {
    pub fn new(
        store: Arc<dyn LeadStore>,
        feed: ActivityFeed,
        qualifier: Qualifier,
        mail: MailService,
    ) -> Self {
        Self {
            store,
            feed,
            qualifier,
            mail,
            source: None,
            baseline_existing: false,
            tracker: Mutex::new(None),
            status: RwLock::new(PollStatus::default()),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn SheetSource>, baseline_existing: bool) -> Self {
        self.source = Some(source);
        self.baseline_existing = baseline_existing;
        self
    }

    pub fn store(&self) -> &Arc<dyn LeadStore> {
        &self.store
    }

    pub fn feed(&self) -> &ActivityFeed {
        &self.feed
    }

    pub fn qualifier(&self) -> &Qualifier {
        &self.qualifier
    }

    pub fn mail(&self) -> &MailService {
        &self.mail
    }

    pub fn source(&self) -> Option<&Arc<dyn SheetSource>> {
        self.source.as_ref()
    }

    pub async fn poll_status(&self) -> PollStatus {
        self.status.read().await.clone()
    }

    async fn require_lead(&self, id: i64) -> Result<Lead, PipelineError> {
        self.store
            .get_lead(id)
            .await?
            .ok_or(PipelineError::NotFound { id })
    }

    /// Validate, dedupe, and insert a lead, then log `lead_created`.
    pub async fn create_lead(&self, new_lead: NewLead) -> Result<Lead, PipelineError> {
        let new_lead = new_lead.validated()?;

        if self.store.get_lead_by_email(&new_lead.email).await?.is_some() {
            return Err(PipelineError::Duplicate {
                email: new_lead.email,
            });
        }

        let lead = match self.store.insert_lead(&new_lead).await {
            Ok(lead) => lead,
            Err(DatabaseError::Constraint(_)) => {
                return Err(PipelineError::Duplicate {
                    email: new_lead.email,
                });
            }
            Err(e) => return Err(e.into()),
        };

        self.feed
            .record_quietly(
                NewActivity::new(
                    lead.id,
                    ActivityKind::LeadCreated,
                    format!("New lead: {} ({})", lead.name, lead.email),
                )
                .with_metadata(json!({ "source": lead.source })),
            )
            .await;

        info!(lead_id = lead.id, email = %lead.email, "Lead created");
        Ok(lead)
    }

    /// Full intake for a new lead: create, qualify, welcome, apply result.
    ///
    /// Email failures are logged and do not abort intake.
    pub async fn onboard_lead(&self, new_lead: NewLead) -> Result<Lead, PipelineError> {
        let lead = self.create_lead(new_lead).await?;
        let qualification = self.qualifier.qualify(&lead, None).await;

        if self.mail.is_configured()
            && let Err(e) = self.mail.send_welcome(&lead).await
        {
            warn!(lead_id = lead.id, error = %e, "Welcome email failed");
        }

        self.apply_qualification(lead.id, &qualification, None).await
    }

    /// Re-run qualification for an existing lead.
    pub async fn qualify_lead(
        &self,
        id: i64,
        response_text: Option<&str>,
    ) -> Result<(Lead, Qualification), PipelineError> {
        let lead = self.require_lead(id).await?;
        let qualification = self.qualifier.qualify(&lead, response_text).await;
        let lead = self.apply_qualification(id, &qualification, None).await?;
        Ok((lead, qualification))
    }

    /// Persist a qualification: status by threshold, score, payload, activity.
    ///
    /// A `needs_review` result is stored but leaves status and score alone.
    async fn apply_qualification(
        &self,
        id: i64,
        qualification: &Qualification,
        analysis: Option<&ResponseAnalysis>,
    ) -> Result<Lead, PipelineError> {
        let current = self.require_lead(id).await?;
        let status = qualification.resulting_status(current.status);

        let update = LeadUpdate {
            status: (status != current.status).then_some(status),
            score: (!qualification.needs_review).then_some(qualification.score),
            qualification_data: Some(serde_json::to_value(qualification).map_err(|e| {
                DatabaseError::Serialization(format!("qualification: {e}"))
            })?),
            response_data: analysis
                .map(serde_json::to_value)
                .transpose()
                .map_err(|e| DatabaseError::Serialization(format!("analysis: {e}")))?,
            ..Default::default()
        };
        let lead = self
            .store
            .update_lead(id, &update)
            .await?
            .ok_or(PipelineError::NotFound { id })?;

        let description = if qualification.needs_review {
            format!("Qualification for {} needs manual review", lead.name)
        } else if qualification.is_qualified {
            format!("Lead qualified with score {}", qualification.score)
        } else {
            format!("Lead not qualified with score {}", qualification.score)
        };
        let mut metadata = json!({ "qualification": qualification, "status": lead.status });
        if let Some(analysis) = analysis {
            metadata["analysis"] = json!(analysis);
        }
        self.feed
            .record_quietly(
                NewActivity::new(id, ActivityKind::LeadQualified, description)
                    .with_metadata(metadata),
            )
            .await;

        info!(
            lead_id = id,
            score = qualification.score,
            status = %lead.status,
            needs_review = qualification.needs_review,
            "Qualification applied"
        );
        Ok(lead)
    }

    /// Record a reply: analyze it, mark the latest email as answered,
    /// then re-qualify with the reply text.
    pub async fn record_response(
        &self,
        id: i64,
        response_text: &str,
    ) -> Result<(Lead, ResponseAnalysis, Qualification), PipelineError> {
        let text = response_text.trim();
        if text.is_empty() {
            return Err(ValidationError::MissingField("response_text").into());
        }
        let lead = self.require_lead(id).await?;

        let analysis = self.qualifier.analyze_response(&lead, text).await;

        if let Some(log) = self.store.latest_email_log_for_lead(id).await? {
            self.store.mark_email_responded(log.id, text).await?;
        }

        self.feed
            .record_quietly(
                NewActivity::new(
                    id,
                    ActivityKind::EmailResponse,
                    format!("Email response received from {}", lead.name),
                )
                .with_metadata(json!({
                    "sentiment": analysis.sentiment,
                    "is_interested": analysis.is_interested,
                    "next_action": analysis.next_action,
                })),
            )
            .await;

        let qualification = self.qualifier.qualify(&lead, Some(text)).await;
        let lead = self
            .apply_qualification(id, &qualification, Some(&analysis))
            .await?;
        Ok((lead, analysis, qualification))
    }

    /// Book a call: status `scheduled` plus `call_scheduled` activity.
    pub async fn schedule_call(&self, id: i64, at: DateTime<Utc>) -> Result<Lead, PipelineError> {
        let lead = self
            .store
            .update_lead(
                id,
                &LeadUpdate {
                    status: Some(LeadStatus::Scheduled),
                    scheduled_call_at: Some(at),
                    ..Default::default()
                },
            )
            .await?
            .ok_or(PipelineError::NotFound { id })?;

        self.feed
            .record_quietly(
                NewActivity::new(
                    id,
                    ActivityKind::CallScheduled,
                    format!("Call scheduled with {}", lead.name),
                )
                .with_metadata(json!({ "scheduled_call_at": at })),
            )
            .await;

        info!(lead_id = id, at = %at, "Call scheduled");
        Ok(lead)
    }

    /// Send a follow-up email to an existing lead.
    pub async fn follow_up(&self, id: i64, message: &str) -> Result<Lead, PipelineError> {
        if message.trim().is_empty() {
            return Err(ValidationError::MissingField("message").into());
        }
        let lead = self.require_lead(id).await?;
        self.mail.send_follow_up(&lead, message).await?;
        self.require_lead(id).await
    }

    /// Apply an admin edit and log `lead_updated`.
    pub async fn update_lead(&self, id: i64, update: LeadUpdate) -> Result<Lead, PipelineError> {
        update.validate()?;
        let lead = self
            .store
            .update_lead(id, &update)
            .await?
            .ok_or(PipelineError::NotFound { id })?;

        let changed = serde_json::to_value(&update)
            .ok()
            .and_then(|v| v.as_object().cloned())
            .map(|fields| {
                fields
                    .into_iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, _)| k)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        self.feed
            .record_quietly(
                NewActivity::new(id, ActivityKind::LeadUpdated, format!("Lead {} updated", lead.name))
                    .with_metadata(json!({ "fields": changed })),
            )
            .await;
        Ok(lead)
    }

    /// Delete a lead and log `lead_deleted`.
    pub async fn delete_lead(&self, id: i64) -> Result<(), PipelineError> {
        let lead = self.require_lead(id).await?;
        if !self.store.delete_lead(id).await? {
            return Err(PipelineError::NotFound { id });
        }

        self.feed
            .record_quietly(NewActivity {
                lead_id: None,
                kind: ActivityKind::LeadDeleted,
                description: format!("Lead {} deleted", lead.name),
                metadata: Some(json!({ "lead_id": id, "email": lead.email })),
            })
            .await;

        info!(lead_id = id, "Lead deleted");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests;
