use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use super::*;
use crate::error::{DatabaseError, SheetError};
use crate::leads::model::{
    Activity, ActivityKind, EmailLog, EmailTemplate, EmailTemplateUpdate, Lead, LeadUpdate,
    NewActivity, NewEmailLog, NewEmailTemplate, NewLead, SystemSetting,
};
use crate::mail::tests::RecordingTransport;
use crate::qualify::tests::{ScriptedLlm, qualification_json};
use crate::qualify::{NextAction, Sentiment};
use crate::sheets::SheetRow;
use crate::store::LibSqlBackend;

/// Sheet source whose rows can be swapped between polls.
#[derive(Default)]
struct StubSource {
    rows: StdMutex<Vec<SheetRow>>,
    error: StdMutex<Option<String>>,
}

impl StubSource {
    fn set(&self, rows: Vec<SheetRow>) {
        *self.rows.lock().unwrap() = rows;
    }

    fn fail(&self, message: &str) {
        *self.error.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl SheetSource for StubSource {
    fn describe(&self) -> String {
        "stub".to_string()
    }

    async fn fetch_rows(&self) -> Result<Vec<SheetRow>, SheetError> {
        if let Some(message) = self.error.lock().unwrap().clone() {
            return Err(SheetError::Remote(message));
        }
        Ok(self.rows.lock().unwrap().clone())
    }
}

/// Delegates to a real backend; the sync-bookkeeping reads can be made to fail.
struct FlakyStore {
    inner: LibSqlBackend,
    fail_sync_reads: AtomicBool,
}

impl FlakyStore {
    fn check(&self) -> Result<(), DatabaseError> {
        if self.fail_sync_reads.load(Ordering::SeqCst) {
            return Err(DatabaseError::Query("database is locked".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl LeadStore for FlakyStore {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        self.inner.init_schema().await
    }
    async fn list_leads(&self) -> Result<Vec<Lead>, DatabaseError> {
        self.inner.list_leads().await
    }
    async fn get_lead(&self, id: i64) -> Result<Option<Lead>, DatabaseError> {
        self.inner.get_lead(id).await
    }
    async fn get_lead_by_email(&self, email: &str) -> Result<Option<Lead>, DatabaseError> {
        self.inner.get_lead_by_email(email).await
    }
    async fn insert_lead(&self, lead: &NewLead) -> Result<Lead, DatabaseError> {
        self.inner.insert_lead(lead).await
    }
    async fn update_lead(&self, id: i64, update: &LeadUpdate) -> Result<Option<Lead>, DatabaseError> {
        self.inner.update_lead(id, update).await
    }
    async fn delete_lead(&self, id: i64) -> Result<bool, DatabaseError> {
        self.inner.delete_lead(id).await
    }
    async fn insert_activity(&self, activity: &NewActivity) -> Result<Activity, DatabaseError> {
        self.inner.insert_activity(activity).await
    }
    async fn list_activities(&self, limit: usize) -> Result<Vec<Activity>, DatabaseError> {
        self.inner.list_activities(limit).await
    }
    async fn list_activities_for_lead(&self, lead_id: i64) -> Result<Vec<Activity>, DatabaseError> {
        self.inner.list_activities_for_lead(lead_id).await
    }
    async fn list_templates(&self) -> Result<Vec<EmailTemplate>, DatabaseError> {
        self.inner.list_templates().await
    }
    async fn get_template(&self, id: i64) -> Result<Option<EmailTemplate>, DatabaseError> {
        self.inner.get_template(id).await
    }
    async fn get_default_template(&self) -> Result<Option<EmailTemplate>, DatabaseError> {
        self.inner.get_default_template().await
    }
    async fn insert_template(
        &self,
        template: &NewEmailTemplate,
    ) -> Result<EmailTemplate, DatabaseError> {
        self.inner.insert_template(template).await
    }
    async fn update_template(
        &self,
        id: i64,
        update: &EmailTemplateUpdate,
    ) -> Result<Option<EmailTemplate>, DatabaseError> {
        self.inner.update_template(id, update).await
    }
    async fn insert_email_log(&self, log: &NewEmailLog) -> Result<EmailLog, DatabaseError> {
        self.inner.insert_email_log(log).await
    }
    async fn list_email_logs(&self) -> Result<Vec<EmailLog>, DatabaseError> {
        self.inner.list_email_logs().await
    }
    async fn latest_email_log_for_lead(
        &self,
        lead_id: i64,
    ) -> Result<Option<EmailLog>, DatabaseError> {
        self.inner.latest_email_log_for_lead(lead_id).await
    }
    async fn mark_email_responded(&self, id: i64, response_text: &str) -> Result<(), DatabaseError> {
        self.inner.mark_email_responded(id, response_text).await
    }
    async fn mark_email_opened(&self, id: i64, at: DateTime<Utc>) -> Result<(), DatabaseError> {
        self.inner.mark_email_opened(id, at).await
    }
    async fn get_setting(&self, key: &str) -> Result<Option<SystemSetting>, DatabaseError> {
        self.check()?;
        self.inner.get_setting(key).await
    }
    async fn set_setting(&self, key: &str, value: &str) -> Result<SystemSetting, DatabaseError> {
        self.inner.set_setting(key, value).await
    }
    async fn seen_row_keys(&self) -> Result<Vec<String>, DatabaseError> {
        self.check()?;
        self.inner.seen_row_keys().await
    }
    async fn record_seen_row(&self, key: &str) -> Result<bool, DatabaseError> {
        self.inner.record_seen_row(key).await
    }
}

struct Harness {
    pipeline: Arc<LeadPipeline>,
    store: Arc<dyn LeadStore>,
    transport: Arc<RecordingTransport>,
    source: Arc<StubSource>,
}

async fn build(
    store: Arc<dyn LeadStore>,
    llm: Option<ScriptedLlm>,
    transport: RecordingTransport,
    baseline: bool,
) -> Harness {
    let feed = ActivityFeed::new(store.clone());
    let qualifier = Qualifier::new(llm.map(|l| Arc::new(l) as Arc<dyn crate::llm::LlmProvider>));
    let transport = Arc::new(transport);
    let mail = MailService::new(store.clone(), feed.clone(), Some(transport.clone()));
    let source = Arc::new(StubSource::default());
    let pipeline = LeadPipeline::new(store.clone(), feed, qualifier, mail)
        .with_source(source.clone(), baseline);
    Harness {
        pipeline: Arc::new(pipeline),
        store,
        transport,
        source,
    }
}

async fn harness(llm: Option<ScriptedLlm>) -> Harness {
    let store: Arc<dyn LeadStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    build(store, llm, RecordingTransport::default(), false).await
}

fn row(n: usize, name: &str, email: &str) -> SheetRow {
    SheetRow {
        row_number: n,
        timestamp: Some(format!("2026-03-01T10:{n:02}:00Z")),
        name: Some(name.to_string()),
        email: Some(email.to_string()),
        company: Some("Acme".to_string()),
        ..Default::default()
    }
}

fn new_lead(name: &str, email: &str) -> NewLead {
    NewLead {
        name: name.into(),
        email: email.into(),
        ..Default::default()
    }
}

async fn count_kind(store: &Arc<dyn LeadStore>, kind: ActivityKind) -> usize {
    store
        .list_activities(1000)
        .await
        .unwrap()
        .iter()
        .filter(|a| a.kind == kind)
        .count()
}

// ── Sync ────────────────────────────────────────────────────────────

#[tokio::test]
async fn two_new_rows_become_two_contacted_leads() {
    let h = harness(Some(ScriptedLlm::always(&qualification_json(82)))).await;
    h.source.set(vec![
        row(1, "Ada", "ada@example.com"),
        row(2, "Grace", "grace@example.com"),
    ]);

    let report = h.pipeline.sync_once().await.unwrap();
    assert_eq!(report.fetched, 2);
    assert_eq!(report.new_rows, 2);
    assert_eq!(report.created, 2);

    let leads = h.store.list_leads().await.unwrap();
    assert_eq!(leads.len(), 2);
    assert_eq!(count_kind(&h.store, ActivityKind::LeadCreated).await, 2);
    assert_eq!(count_kind(&h.store, ActivityKind::LeadQualified).await, 2);
    assert_eq!(h.transport.sent().len(), 2);

    for lead in leads {
        assert_eq!(lead.status, LeadStatus::Qualified);
        assert_eq!(lead.score, 82);
        assert!(lead.last_contacted_at.is_some());
        assert_eq!(lead.qualification_data.unwrap()["score"], 82);
    }
}

#[tokio::test]
async fn repolling_the_same_rows_creates_nothing() {
    let h = harness(None).await;
    h.source.set(vec![row(1, "Ada", "ada@example.com")]);

    h.pipeline.sync_once().await.unwrap();
    let report = h.pipeline.sync_once().await.unwrap();

    assert_eq!(report.fetched, 1);
    assert_eq!(report.new_rows, 0);
    assert_eq!(h.store.list_leads().await.unwrap().len(), 1);
    assert_eq!(h.transport.sent().len(), 1);
}

#[tokio::test]
async fn duplicate_email_row_is_skipped() {
    let h = harness(None).await;
    h.pipeline
        .create_lead(new_lead("Ada", "ada@example.com"))
        .await
        .unwrap();

    h.source.set(vec![row(1, "Ada Again", "ADA@example.com")]);
    let report = h.pipeline.sync_once().await.unwrap();

    assert_eq!(report.duplicates, 1);
    assert_eq!(report.created, 0);
    assert_eq!(h.store.list_leads().await.unwrap().len(), 1);
    assert!(h.transport.sent().is_empty());

    let again = h.pipeline.sync_once().await.unwrap();
    assert_eq!(again.new_rows, 0);
}

#[tokio::test]
async fn rows_missing_name_or_email_are_skipped() {
    let h = harness(None).await;
    let mut no_name = row(1, "", "ada@example.com");
    no_name.name = None;
    let mut no_email = row(2, "Grace", "");
    no_email.email = None;
    let bad_email = row(3, "Linus", "not-an-email");
    h.source.set(vec![no_name, no_email, bad_email]);

    let report = h.pipeline.sync_once().await.unwrap();
    assert_eq!(report.invalid, 3);
    assert_eq!(report.created, 0);
    assert!(h.store.list_leads().await.unwrap().is_empty());

    let again = h.pipeline.sync_once().await.unwrap();
    assert_eq!(again.new_rows, 0);
}

#[tokio::test]
async fn shrunk_and_reordered_sheet_still_yields_new_rows() {
    let h = harness(None).await;
    h.source.set(vec![
        row(1, "Ada", "ada@example.com"),
        row(2, "Grace", "grace@example.com"),
        row(3, "Linus", "linus@example.com"),
    ]);
    assert_eq!(h.pipeline.sync_once().await.unwrap().created, 3);

    // Sheet shrinks from three rows to two, one of which is new.
    h.source.set(vec![
        row(9, "Barbara", "barbara@example.com"),
        row(2, "Grace", "grace@example.com"),
    ]);
    let report = h.pipeline.sync_once().await.unwrap();
    assert_eq!(report.new_rows, 1);
    assert_eq!(report.created, 1);
    assert!(
        h.store
            .get_lead_by_email("barbara@example.com")
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn seen_rows_survive_restart() {
    let store: Arc<dyn LeadStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let first = build(store.clone(), None, RecordingTransport::default(), false).await;
    first.source.set(vec![row(1, "Ada", "ada@example.com")]);
    first.pipeline.sync_once().await.unwrap();

    let second = build(store.clone(), None, RecordingTransport::default(), false).await;
    second.source.set(vec![
        row(1, "Ada", "ada@example.com"),
        row(2, "Grace", "grace@example.com"),
    ]);
    let report = second.pipeline.sync_once().await.unwrap();
    assert_eq!(report.new_rows, 1);
    assert_eq!(second.transport.sent().len(), 1);
}

#[tokio::test]
async fn baseline_marks_existing_rows_without_ingesting() {
    let store: Arc<dyn LeadStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let h = build(store, None, RecordingTransport::default(), true).await;
    h.source.set(vec![
        row(1, "Ada", "ada@example.com"),
        row(2, "Grace", "grace@example.com"),
    ]);

    let report = h.pipeline.sync_once().await.unwrap();
    assert_eq!(report.baselined, 2);
    assert_eq!(report.created, 0);
    assert!(h.store.list_leads().await.unwrap().is_empty());

    h.source.set(vec![
        row(1, "Ada", "ada@example.com"),
        row(2, "Grace", "grace@example.com"),
        row(3, "Linus", "linus@example.com"),
    ]);
    let report = h.pipeline.sync_once().await.unwrap();
    assert_eq!(report.baselined, 0);
    assert_eq!(report.created, 1);
}

#[tokio::test]
async fn baseline_on_empty_sheet_happens_once() {
    let store: Arc<dyn LeadStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let h = build(store, None, RecordingTransport::default(), true).await;

    let report = h.pipeline.sync_once().await.unwrap();
    assert_eq!(report.baselined, 0);

    h.source.set(vec![row(1, "Ada", "ada@example.com")]);
    let report = h.pipeline.sync_once().await.unwrap();
    assert_eq!(report.created, 1);
}

#[tokio::test]
async fn concurrent_syncs_do_not_double_ingest() {
    let h = harness(None).await;
    h.source.set(vec![
        row(1, "Ada", "ada@example.com"),
        row(2, "Grace", "grace@example.com"),
    ]);

    let (a, b) = tokio::join!(h.pipeline.sync_once(), h.pipeline.sync_once());
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.created + b.created, 2);
    assert_eq!(a.duplicates + b.duplicates, 0);
    assert_eq!(h.transport.sent().len(), 2);
}

#[tokio::test]
async fn fetch_error_is_reported_and_recorded() {
    let h = harness(None).await;
    h.source.fail("Sheet not found");

    let err = h.pipeline.sync_once().await.unwrap_err();
    assert!(matches!(err, PipelineError::Sheet(_)));

    let status = h.pipeline.poll_status().await;
    assert!(status.last_checked_at.is_some());
    assert!(status.last_success_at.is_none());
    assert!(status.last_error.unwrap().contains("Sheet not found"));
}

#[tokio::test]
async fn store_error_during_sync_is_recorded_in_poll_status() {
    let flaky = Arc::new(FlakyStore {
        inner: LibSqlBackend::new_memory().await.unwrap(),
        fail_sync_reads: AtomicBool::new(true),
    });
    let h = build(flaky.clone(), None, RecordingTransport::default(), true).await;
    h.source.set(vec![
        row(1, "Ada", "ada@example.com"),
        row(2, "Grace", "grace@example.com"),
    ]);

    let err = h.pipeline.sync_once().await.unwrap_err();
    assert!(matches!(err, PipelineError::Database(_)));
    let status = h.pipeline.poll_status().await;
    assert!(status.last_checked_at.is_some());
    assert!(status.last_success_at.is_none());
    assert!(status.last_error.unwrap().contains("database is locked"));

    flaky.fail_sync_reads.store(false, Ordering::SeqCst);
    let report = h.pipeline.sync_once().await.unwrap();
    assert_eq!(report.baselined, 2);
    assert!(h.store.list_leads().await.unwrap().is_empty());
    let status = h.pipeline.poll_status().await;
    assert!(status.last_error.is_none());
    assert!(status.last_success_at.is_some());
}

#[tokio::test]
async fn successful_sync_updates_poll_status() {
    let h = harness(None).await;
    h.source.set(vec![row(1, "Ada", "ada@example.com")]);
    h.pipeline.sync_once().await.unwrap();

    let status = h.pipeline.poll_status().await;
    assert!(status.last_success_at.is_some());
    assert!(status.last_error.is_none());
    assert_eq!(status.last_report.unwrap().created, 1);
}

#[tokio::test]
async fn sync_without_source_is_an_error() {
    let store: Arc<dyn LeadStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let feed = ActivityFeed::new(store.clone());
    let mail = MailService::new(store.clone(), feed.clone(), None);
    let pipeline = LeadPipeline::new(store, feed, Qualifier::disabled(), mail);
    assert!(matches!(
        pipeline.sync_once().await,
        Err(PipelineError::SourceNotConfigured)
    ));
}

// ── Intake ──────────────────────────────────────────────────────────

#[tokio::test]
async fn fallback_qualification_keeps_status() {
    let h = harness(None).await;
    let lead = h
        .pipeline
        .onboard_lead(new_lead("Ada", "ada@example.com"))
        .await
        .unwrap();

    assert_eq!(lead.status, LeadStatus::Contacted);
    assert_eq!(lead.score, 0);
    let data = lead.qualification_data.unwrap();
    assert_eq!(data["needs_review"], true);
    assert_eq!(data["next_steps"][0], "Manual review required");
}

#[tokio::test]
async fn welcome_failure_does_not_abort_intake() {
    let store: Arc<dyn LeadStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let h = build(
        store,
        Some(ScriptedLlm::always(&qualification_json(15))),
        RecordingTransport::failing(),
        false,
    )
    .await;

    let lead = h
        .pipeline
        .onboard_lead(new_lead("Ada", "ada@example.com"))
        .await
        .unwrap();
    assert_eq!(lead.status, LeadStatus::Unqualified);
    assert_eq!(lead.score, 15);
    assert!(lead.last_contacted_at.is_none());
    assert!(h.store.list_email_logs().await.unwrap().is_empty());
    assert_eq!(count_kind(&h.store, ActivityKind::EmailSent).await, 0);
}

#[tokio::test]
async fn create_lead_rejects_duplicates_and_invalid_input() {
    let h = harness(None).await;
    h.pipeline
        .create_lead(new_lead("Ada", "ada@example.com"))
        .await
        .unwrap();

    assert!(matches!(
        h.pipeline.create_lead(new_lead("Ada", " Ada@Example.com")).await,
        Err(PipelineError::Duplicate { email }) if email == "ada@example.com"
    ));
    assert!(matches!(
        h.pipeline.create_lead(new_lead("", "x@example.com")).await,
        Err(PipelineError::Validation(_))
    ));
}

#[tokio::test]
async fn qualification_thresholds_drive_status() {
    let llm = ScriptedLlm::new(vec![
        Ok(qualification_json(70)),
        Ok(qualification_json(69)),
        Ok(qualification_json(29)),
        Ok(qualification_json(30)),
    ]);
    let h = harness(Some(llm)).await;
    let lead = h
        .pipeline
        .create_lead(new_lead("Ada", "ada@example.com"))
        .await
        .unwrap();

    let (lead_after, _) = h.pipeline.qualify_lead(lead.id, None).await.unwrap();
    assert_eq!(lead_after.status, LeadStatus::Qualified);

    let (lead_after, q) = h.pipeline.qualify_lead(lead.id, None).await.unwrap();
    assert_eq!(q.score, 69);
    assert_eq!(lead_after.status, LeadStatus::Qualified);
    assert_eq!(lead_after.score, 69);

    let (lead_after, _) = h.pipeline.qualify_lead(lead.id, None).await.unwrap();
    assert_eq!(lead_after.status, LeadStatus::Unqualified);

    let (lead_after, _) = h.pipeline.qualify_lead(lead.id, None).await.unwrap();
    assert_eq!(lead_after.status, LeadStatus::Unqualified);
    assert_eq!(lead_after.score, 30);
}

#[tokio::test]
async fn qualify_missing_lead_is_not_found() {
    let h = harness(None).await;
    assert!(matches!(
        h.pipeline.qualify_lead(404, None).await,
        Err(PipelineError::NotFound { id: 404 })
    ));
}

// ── Follow-up actions ───────────────────────────────────────────────

#[tokio::test]
async fn record_response_marks_email_and_requalifies() {
    let analysis = r#"{"hasResponse": true, "sentiment": "positive", "isInterested": true, "questions": [], "concerns": [], "nextAction": "schedule_call"}"#;
    let llm = ScriptedLlm::new(vec![Ok(analysis.to_string()), Ok(qualification_json(85))]);
    let h = harness(Some(llm)).await;

    let lead = h
        .pipeline
        .create_lead(new_lead("Ada", "ada@example.com"))
        .await
        .unwrap();
    h.pipeline.mail().send_welcome(&lead).await.unwrap();

    let (lead, analysis, qualification) = h
        .pipeline
        .record_response(lead.id, "We'd love a demo next week")
        .await
        .unwrap();

    assert_eq!(analysis.sentiment, Sentiment::Positive);
    assert_eq!(analysis.next_action, NextAction::ScheduleCall);
    assert_eq!(qualification.score, 85);
    assert_eq!(lead.status, LeadStatus::Qualified);
    assert_eq!(lead.response_data.unwrap()["sentiment"], "positive");

    let log = h.store.latest_email_log_for_lead(lead.id).await.unwrap().unwrap();
    assert!(log.responded);
    assert_eq!(log.response_text.as_deref(), Some("We'd love a demo next week"));
    assert_eq!(count_kind(&h.store, ActivityKind::EmailResponse).await, 1);
}

#[tokio::test]
async fn empty_response_is_rejected() {
    let h = harness(None).await;
    let lead = h
        .pipeline
        .create_lead(new_lead("Ada", "ada@example.com"))
        .await
        .unwrap();
    assert!(matches!(
        h.pipeline.record_response(lead.id, "   ").await,
        Err(PipelineError::Validation(_))
    ));
}

#[tokio::test]
async fn schedule_call_sets_status_and_time() {
    let h = harness(None).await;
    let lead = h
        .pipeline
        .create_lead(new_lead("Ada", "ada@example.com"))
        .await
        .unwrap();
    let at = Utc.with_ymd_and_hms(2026, 4, 2, 15, 30, 0).unwrap();

    let lead = h.pipeline.schedule_call(lead.id, at).await.unwrap();
    assert_eq!(lead.status, LeadStatus::Scheduled);
    assert_eq!(lead.scheduled_call_at, Some(at));
    assert_eq!(count_kind(&h.store, ActivityKind::CallScheduled).await, 1);
}

#[tokio::test]
async fn follow_up_sends_and_stamps_contact() {
    let h = harness(None).await;
    let lead = h
        .pipeline
        .create_lead(new_lead("Ada", "ada@example.com"))
        .await
        .unwrap();

    let lead = h.pipeline.follow_up(lead.id, "Any questions?").await.unwrap();
    assert!(lead.last_contacted_at.is_some());
    assert_eq!(h.transport.sent()[0].subject, "Following up - Your Business");
    assert!(matches!(
        h.pipeline.follow_up(lead.id, "").await,
        Err(PipelineError::Validation(_))
    ));
}

#[tokio::test]
async fn update_and_delete_are_logged() {
    let h = harness(None).await;
    let lead = h
        .pipeline
        .create_lead(new_lead("Ada", "ada@example.com"))
        .await
        .unwrap();

    let updated = h
        .pipeline
        .update_lead(
            lead.id,
            LeadUpdate {
                company: Some("Analytical Engines".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.company.as_deref(), Some("Analytical Engines"));

    let bad = LeadUpdate {
        score: Some(-1),
        ..Default::default()
    };
    assert!(matches!(
        h.pipeline.update_lead(lead.id, bad).await,
        Err(PipelineError::Validation(_))
    ));

    h.pipeline.delete_lead(lead.id).await.unwrap();
    assert!(h.store.get_lead(lead.id).await.unwrap().is_none());
    assert!(matches!(
        h.pipeline.delete_lead(lead.id).await,
        Err(PipelineError::NotFound { .. })
    ));

    let activities = h.store.list_activities(10).await.unwrap();
    assert_eq!(activities[0].kind, ActivityKind::LeadDeleted);
    assert_eq!(activities[0].metadata.as_ref().unwrap()["lead_id"], lead.id);
    assert_eq!(activities[1].kind, ActivityKind::LeadUpdated);
    assert_eq!(activities[1].metadata.as_ref().unwrap()["fields"][0], "company");
    assert!(activities.iter().all(|a| a.lead_id.is_none()));
    assert!(h.store.list_activities_for_lead(lead.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn poller_ingests_on_first_tick_and_stops_on_flag() {
    let h = harness(None).await;
    h.source.set(vec![row(1, "Ada", "ada@example.com")]);

    let (handle, shutdown) =
        spawn_sheet_poller(Arc::clone(&h.pipeline), std::time::Duration::from_millis(20));

    let mut created = false;
    for _ in 0..50 {
        if !h.store.list_leads().await.unwrap().is_empty() {
            created = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(created, "poller never ingested the row");

    shutdown.store(true, std::sync::atomic::Ordering::Relaxed);
    tokio::time::timeout(std::time::Duration::from_secs(2), handle)
        .await
        .expect("poller did not stop")
        .unwrap();
    assert_eq!(h.store.list_leads().await.unwrap().len(), 1);
}
