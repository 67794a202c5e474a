//! Worker loop: pull jobs until idle for too long, released, or cancelled.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::{Inner, Job};

enum Next {
    Run(Job),
    Exit,
}

pub(super) async fn run(inner: Arc<Inner>) {
    tracing::debug!(pool = inner.name, "worker started");
    loop {
        let job = match next_job(&inner).await {
            Next::Run(job) => job,
            Next::Exit => return,
        };
        if inner.shutdown.is_cancelled() {
            // Queued work is dropped rather than started once shutdown begins.
            inner.live.fetch_sub(1, Ordering::SeqCst);
            return;
        }
        let Ok(_permit) = inner.slots.acquire().await else {
            inner.live.fetch_sub(1, Ordering::SeqCst);
            return;
        };
        if AssertUnwindSafe(job).catch_unwind().await.is_err() {
            tracing::error!(pool = inner.name, "job panicked");
        }
    }
}

/// Wait for the next job. Decrements the live count on every `Exit` path.
async fn next_job(inner: &Inner) -> Next {
    let recv = async { inner.receiver.lock().await.recv().await };
    tokio::select! {
        _ = inner.shutdown.token().cancelled() => {
            inner.live.fetch_sub(1, Ordering::SeqCst);
            Next::Exit
        }
        res = tokio::time::timeout(inner.idle_timeout, recv) => match res {
            Ok(Some(job)) => Next::Run(job),
            Ok(None) => {
                tracing::debug!(pool = inner.name, "worker exiting, pool released");
                inner.live.fetch_sub(1, Ordering::SeqCst);
                Next::Exit
            }
            Err(_) => reclaim(inner).await,
        }
    }
}

/// Idle timeout hit: give the slot back, unless a job slipped in while we were leaving.
async fn reclaim(inner: &Inner) -> Next {
    inner.live.fetch_sub(1, Ordering::SeqCst);
    match inner.receiver.lock().await.try_recv() {
        Ok(job) => {
            inner.live.fetch_add(1, Ordering::SeqCst);
            Next::Run(job)
        }
        Err(_) => {
            tracing::debug!(pool = inner.name, "idle worker reclaimed");
            Next::Exit
        }
    }
}
