//! Sheet sync: fetch, diff against seen keys, ingest new rows.

use chrono::Utc;
use tracing::{debug, info, warn};

use super::{LeadPipeline, RowOutcome, SyncReport};
use crate::error::PipelineError;
use crate::sheets::{RowTracker, SheetRow, SheetSource};

/// Setting written once the first-sync baseline has been taken.
const BASELINE_SETTING: &str = "sheets.baseline_at";

impl LeadPipeline {
    /// Run one sync pass against the configured sheet source.
    ///
    /// Concurrent callers queue on the tracker lock; passes never overlap.
    pub async fn sync_once(&self) -> Result<SyncReport, PipelineError> {
        let source = self
            .source
            .as_ref()
            .ok_or(PipelineError::SourceNotConfigured)?;

        let mut guard = self.tracker.lock().await;
        let checked_at = Utc::now();
        let result = self.run_pass(&**source, &mut guard).await;
        drop(guard);

        let mut status = self.status.write().await;
        status.last_checked_at = Some(checked_at);
        let report = match result {
            Ok(report) => report,
            Err(e) => {
                status.last_error = Some(e.to_string());
                return Err(e);
            }
        };
        status.last_success_at = Some(checked_at);
        status.last_error = None;
        status.last_report = Some(report.clone());
        drop(status);

        if report.new_rows > 0 {
            info!(
                new_rows = report.new_rows,
                created = report.created,
                duplicates = report.duplicates,
                invalid = report.invalid,
                failed = report.failed,
                "Sheet sync complete"
            );
        } else {
            debug!(fetched = report.fetched, "Sheet sync found no new rows");
        }
        Ok(report)
    }

    /// Fetch and diff under the tracker lock. A tracker loaded here stays
    /// cached in `slot` even if a later step fails.
    async fn run_pass(
        &self,
        source: &dyn SheetSource,
        slot: &mut Option<RowTracker>,
    ) -> Result<SyncReport, PipelineError> {
        let rows = source.fetch_rows().await?;

        let tracker = match slot.take() {
            Some(tracker) => tracker,
            None => RowTracker::from_keys(self.store.seen_row_keys().await?),
        };
        let tracker = slot.insert(tracker);

        let mut report = SyncReport {
            fetched: rows.len(),
            ..Default::default()
        };

        if self.should_baseline(tracker).await? {
            report.baselined = self.baseline(tracker, &rows).await?;
            info!(rows = report.baselined, "Baselined existing sheet rows");
            return Ok(report);
        }

        let fresh = tracker.diff(rows);
        report.new_rows = fresh.len();

        for row in fresh {
            let outcome = self.ingest_row(&row).await;
            match &outcome {
                RowOutcome::Created { .. } => report.created += 1,
                RowOutcome::Duplicate { .. } => report.duplicates += 1,
                RowOutcome::Invalid { .. } => report.invalid += 1,
                RowOutcome::Failed { .. } => report.failed += 1,
            }
            if outcome.is_final() {
                self.remember(tracker, row.identity_key()).await;
            }
        }
        Ok(report)
    }

    /// Turn one sheet row into a lead. Never fails; the outcome says why.
    pub async fn ingest_row(&self, row: &SheetRow) -> RowOutcome {
        match self.onboard_lead(row.to_new_lead()).await {
            Ok(lead) => RowOutcome::Created { lead_id: lead.id },
            Err(PipelineError::Duplicate { email }) => {
                debug!(row = row.row_number, email = %email, "Skipping duplicate sheet row");
                RowOutcome::Duplicate { email }
            }
            Err(PipelineError::Validation(e)) => {
                warn!(row = row.row_number, error = %e, "Skipping invalid sheet row");
                RowOutcome::Invalid {
                    reason: e.to_string(),
                }
            }
            Err(e) => {
                warn!(row = row.row_number, error = %e, "Failed to ingest sheet row");
                RowOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn should_baseline(&self, tracker: &RowTracker) -> Result<bool, PipelineError> {
        if !self.baseline_existing || !tracker.is_empty() {
            return Ok(false);
        }
        Ok(self.store.get_setting(BASELINE_SETTING).await?.is_none())
    }

    async fn baseline(
        &self,
        tracker: &mut RowTracker,
        rows: &[SheetRow],
    ) -> Result<usize, PipelineError> {
        let mut count = 0;
        for row in rows {
            let key = row.identity_key();
            if !tracker.contains(&key) {
                self.remember(tracker, key).await;
                count += 1;
            }
        }
        self.store
            .set_setting(BASELINE_SETTING, &Utc::now().to_rfc3339())
            .await?;
        Ok(count)
    }

    async fn remember(&self, tracker: &mut RowTracker, key: String) {
        if let Err(e) = self.store.record_seen_row(&key).await {
            warn!(key = %key, error = %e, "Failed to persist seen row key");
        }
        tracker.mark_seen(key);
    }
}
