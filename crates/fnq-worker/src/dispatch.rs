//! Tracked fire-and-forget dispatch
//!
//! Every admitted task runs as its own tokio task. The tracker is the drain
//! barrier the runner joins on shutdown: no dispatched execution is ever
//! abandoned mid-flight.

use std::future::Future;

use tokio_util::task::TaskTracker;

/// Spawns one concurrent unit of work per admitted task and remembers it
/// until it finishes.
pub struct Dispatcher {
    tracker: TaskTracker,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
        }
    }

    /// Spawn a tracked execution. The future's outcome is not observed
    /// here; executions report through logging and the datastore.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(future);
    }

    /// Number of executions currently in flight.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting new work and wait for every in-flight execution to
    /// finish. Called exactly once, on shutdown.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
