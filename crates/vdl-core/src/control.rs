//! Process-wide cancellation and shutdown gate.
//!
//! A single `Shutdown` is created at the process root. Every pool worker and
//! long-running loop holds a clone of its token and checks it before starting
//! new network IO. Tasks are spawned through its tracker so `shutdown` can
//! wait for all of them to observe cancellation and exit.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Error returned when work stops because the process is shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cancelled by shutdown")]
pub struct Cancelled;

#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
    tracker: TaskTracker,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Spawn a tracked task; `wait` will not return until it finishes.
    pub fn spawn<F>(&self, fut: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tracker.spawn(fut)
    }

    /// Signal cancellation to every holder of the token.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancel, then wait for every tracked task to exit.
    pub async fn shutdown(&self) {
        self.cancel();
        self.wait().await;
    }

    /// Wait for tracked tasks without cancelling (used after all work completed).
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Like `shutdown`, giving up after `grace`. Returns false on timeout.
    pub async fn shutdown_within(&self, grace: Duration) -> bool {
        self.cancel();
        tokio::time::timeout(grace, self.wait()).await.is_ok()
    }

    pub fn tracked_tasks(&self) -> usize {
        self.tracker.len()
    }
}
