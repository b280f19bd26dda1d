//! Activity feed: persists audit entries and fans them out to live clients.
//!
//! Every state change goes through `ActivityFeed::record`, which writes the
//! entry to the store and then broadcasts it to `/ws/activity` subscribers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::model::{Activity, NewActivity};
use crate::error::DatabaseError;
use crate::store::LeadStore;

/// Messages pushed over the activity WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityWsMessage {
    /// Recent history, sent on connect and after a lagged receiver.
    Sync { activities: Vec<Activity> },
    /// A single new entry.
    Activity { activity: Activity },
}

/// Store-backed audit log with a broadcast channel for live updates.
#[derive(Clone)]
pub struct ActivityFeed {
    store: Arc<dyn LeadStore>,
    tx: broadcast::Sender<Activity>,
}

impl ActivityFeed {
    pub fn new(store: Arc<dyn LeadStore>) -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { store, tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Activity> {
        self.tx.subscribe()
    }

    /// Persist an activity and broadcast it.
    pub async fn record(&self, activity: NewActivity) -> Result<Activity, DatabaseError> {
        let saved = self.store.insert_activity(&activity).await?;
        debug!(
            activity_id = saved.id,
            lead_id = ?saved.lead_id,
            kind = saved.kind.as_str(),
            "Activity recorded"
        );
        // No receivers is fine.
        let _ = self.tx.send(saved.clone());
        Ok(saved)
    }

    /// Record an activity, logging instead of failing.
    ///
    /// Audit entries never abort the operation that produced them.
    pub async fn record_quietly(&self, activity: NewActivity) -> Option<Activity> {
        let kind = activity.kind;
        match self.record(activity).await {
            Ok(saved) => Some(saved),
            Err(e) => {
                warn!(kind = kind.as_str(), error = %e, "Failed to record activity");
                None
            }
        }
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<Activity>, DatabaseError> {
        self.store.list_activities(limit).await
    }
}
