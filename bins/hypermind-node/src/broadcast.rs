//! Throttled dashboard broadcaster.
//!
//! Peer-set churn can be arbitrarily fast; browsers do not need more than
//! one update a second. Change notifications are coalesced and pushed at
//! most once per throttle window, except for forced refreshes (opt-in),
//! which break through immediately.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Notify};
use tokio::time::Instant;
use tracing::debug;

use crate::api::types::StatsSnapshot;
use crate::service::StatsSource;

pub struct Broadcaster {
    tx: broadcast::Sender<StatsSnapshot>,
    changed: Notify,
    forced: Notify,
    throttle: Duration,
}

impl Broadcaster {
    pub fn new(throttle: Duration) -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            tx,
            changed: Notify::new(),
            forced: Notify::new(),
            throttle,
        }
    }

    /// Subscribe to future pushes. New dashboard clients also get an
    /// immediate snapshot straight from [`StatsSource`]; this stream only
    /// carries the deltas after that.
    pub fn subscribe(&self) -> broadcast::Receiver<StatsSnapshot> {
        self.tx.subscribe()
    }

    /// Note that the peer set (or diagnostics window) changed. Coalesced.
    pub fn mark_changed(&self) {
        self.changed.notify_one();
    }

    /// Push as soon as possible, ignoring the throttle.
    pub fn force(&self) {
        self.forced.notify_one();
    }

    /// Drive pushes forever. Run as a dedicated task.
    pub async fn run(self: Arc<Self>, stats: StatsSource) {
        let mut last_push: Option<Instant> = None;
        loop {
            let forced = tokio::select! {
                _ = self.changed.notified() => false,
                _ = self.forced.notified() => true,
            };

            if !forced {
                if let Some(last) = last_push {
                    let elapsed = last.elapsed();
                    if elapsed < self.throttle {
                        // Sit out the rest of the window; a force breaks
                        // through, further plain changes coalesce.
                        tokio::select! {
                            _ = tokio::time::sleep(self.throttle - elapsed) => {}
                            _ = self.forced.notified() => {}
                        }
                    }
                }
            }

            last_push = Some(Instant::now());
            let snapshot = stats.snapshot();
            debug!(count = snapshot.count, "dashboard push");
            let _ = self.tx.send(snapshot);
        }
    }
}
