//! Background eviction of idle tickets and lapsed flood records.
//!
//! Only bounds memory for senders who go silent. Expiry on lookup remains the
//! source of truth, so the cadence never changes a reply.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::intake::flood::FloodGuard;
use crate::intake::lifecycle::TicketLifecycle;

/// Handle to the running sweep. Stop it with [`SweepTask::stop`]; dropping
/// the handle aborts the task.
pub struct SweepTask {
    stop_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl SweepTask {
    /// Spawn a sweep that runs every `interval`, starting one interval from now.
    pub fn spawn(lifecycle: TicketLifecycle, flood: Arc<FloodGuard>, interval: Duration) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // Skip immediate first tick
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        let (tickets, flood_records) = sweep_once(&lifecycle, &flood);
                        if tickets + flood_records > 0 {
                            info!(tickets, flood_records, "Evicted idle sender state");
                        }
                    }
                }
            }
            debug!("Sweep task stopped");
        });

        Self {
            stop_tx: Some(stop_tx),
            handle,
        }
    }

    /// Signal the task to stop and wait for it to exit.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.handle).await;
    }
}

impl Drop for SweepTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// One eviction pass. Returns `(tickets, flood_records)` removed.
pub fn sweep_once(lifecycle: &TicketLifecycle, flood: &FloodGuard) -> (usize, usize) {
    let now = Utc::now();
    (lifecycle.evict_expired(now), flood.evict_stale(now))
}
