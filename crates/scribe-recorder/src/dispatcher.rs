//! Write-behind dispatcher — fire-and-forget submission of store chains.
//!
//! Each event's persistence work is one spawned task: an ordered chain of
//! awaited store steps, preserving intra-event ordering while permitting
//! inter-event races. The event handler never awaits the task; failures are
//! handled inside the chain (health gate + log sink) and never propagate.

use std::future::Future;

use tokio_util::task::TaskTracker;
use tracing::trace;

/// Fire-and-forget task dispatcher for write-behind chains.
#[derive(Debug)]
pub struct Dispatcher {
    tracker: TaskTracker,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
        }
    }

    /// Spawn a write-behind chain. Returns immediately.
    pub fn dispatch<F>(&self, label: &'static str, chain: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        trace!(label, "dispatching write-behind chain");
        let _ = self.tracker.spawn(chain);
    }

    /// Number of chains currently in flight.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for every dispatched chain to settle.
    ///
    /// Quiescence point for shutdown and tests; event handling itself never
    /// calls this.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
