//! Background sheet poller.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::LeadPipeline;

/// Spawn the sheet polling loop.
///
/// The first tick fires immediately. Set the returned flag to stop the loop
/// at its next tick.
pub fn spawn_sheet_poller(
    pipeline: Arc<LeadPipeline>,
    interval: Duration,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!("Sheet poller started (interval: {}s)", interval.as_secs());

        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tick.tick().await;

            if flag.load(Ordering::Relaxed) {
                info!("Sheet poller shutting down");
                return;
            }

            if let Err(e) = pipeline.sync_once().await {
                error!("Sheet poll failed: {e}");
            }
        }
    });

    (handle, shutdown)
}
