//! Periodic sweep of stale attempt records
//!
//! Housekeeping only: the tracker recomputes lock state from timestamps on
//! every call, so a missed or late sweep never changes a lockout decision.

use std::sync::Arc;
use std::time::Duration;

use tillguard_core::AttemptTracker;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Evicts expired lockouts and idle records on a fixed period
pub struct Janitor {
    tracker: Arc<AttemptTracker>,
    interval: Duration,
}

/// Handle to a running janitor task
pub struct JanitorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Janitor {
    pub fn new(tracker: Arc<AttemptTracker>, interval: Duration) -> Self {
        Self { tracker, interval }
    }

    /// Run one sweep now. Returns the number of records evicted.
    pub fn run_once(&self) -> usize {
        let evicted = self.tracker.sweep();
        debug!(
            "Attempt sweep evicted {} records, {} remaining",
            evicted,
            self.tracker.len()
        );
        evicted
    }

    /// Start sweeping on the current tokio runtime
    ///
    /// The first sweep runs one full interval after spawning.
    pub fn spawn(self) -> JanitorHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval() fires immediately; skip that tick
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once();
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            debug!("Attempt sweep stopped");
        });

        JanitorHandle { shutdown, task }
    }
}

impl JanitorHandle {
    /// Stop the task and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }

    /// Whether the task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
