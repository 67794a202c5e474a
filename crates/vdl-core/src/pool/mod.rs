//! Bounded worker pools for whole-media jobs and for chunk/segment fetches.
//!
//! A pool owns a FIFO queue and at most `capacity` worker tasks. Workers are
//! spawned on demand through the process `Shutdown` tracker, exit after the
//! idle timeout, and stop picking up work once cancellation fires. Submitting
//! to a released pool fails with `PoolError::Released`.

mod worker;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

use crate::control::Shutdown;

/// Default idle window before a worker is reclaimed.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

pub(crate) type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("{0} pool has been released")]
    Released(&'static str),
}

struct Inner {
    name: &'static str,
    capacity: usize,
    idle_timeout: Duration,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<Job>>,
    live: AtomicUsize,
    slots: Semaphore,
    shutdown: Shutdown,
}

#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.inner.name)
            .field("capacity", &self.inner.capacity)
            .field("live", &self.live_workers())
            .finish()
    }
}

impl WorkerPool {
    pub fn new(name: &'static str, capacity: usize, idle_timeout: Duration, shutdown: &Shutdown) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                name,
                capacity,
                idle_timeout,
                sender: Mutex::new(Some(tx)),
                receiver: tokio::sync::Mutex::new(rx),
                live: AtomicUsize::new(0),
                slots: Semaphore::new(capacity),
                shutdown: shutdown.clone(),
            }),
        }
    }

    /// Queue `fut`; it runs as soon as a slot is free.
    pub fn submit<F>(&self, fut: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        {
            let guard = self.inner.sender.lock().unwrap_or_else(|e| e.into_inner());
            let tx = guard.as_ref().ok_or(PoolError::Released(self.inner.name))?;
            tx.send(Box::pin(fut))
                .map_err(|_| PoolError::Released(self.inner.name))?;
        }
        self.spawn_worker_if_below_capacity();
        Ok(())
    }

    fn spawn_worker_if_below_capacity(&self) {
        let inner = &self.inner;
        let mut cur = inner.live.load(Ordering::SeqCst);
        loop {
            if cur >= inner.capacity {
                return;
            }
            match inner
                .live
                .compare_exchange(cur, cur + 1, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => break,
                Err(actual) => cur = actual,
            }
        }
        inner.shutdown.spawn(worker::run(Arc::clone(inner)));
    }

    /// Stop accepting work. Already queued jobs still run; idle workers then exit.
    pub fn release(&self) {
        let prev = self
            .inner
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if prev.is_some() {
            tracing::debug!(pool = self.inner.name, "pool released");
        }
    }

    pub fn is_released(&self) -> bool {
        self.inner
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn live_workers(&self) -> usize {
        self.inner.live.load(Ordering::SeqCst)
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::{oneshot, Notify};

    fn pool(capacity: usize, shutdown: &Shutdown) -> WorkerPool {
        WorkerPool::new("test", capacity, DEFAULT_IDLE_TIMEOUT, shutdown)
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_capacity() {
        let shutdown = Shutdown::new();
        let p = pool(2, &shutdown);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel();
        for _ in 0..8 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let tx = tx.clone();
            p.submit(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                let _ = tx.send(());
            })
            .unwrap();
        }
        drop(tx);
        let mut done = 0;
        while rx.recv().await.is_some() {
            done += 1;
        }
        assert_eq!(done, 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(p.live_workers() <= 2);
    }

    #[tokio::test]
    async fn submit_after_release_fails() {
        let shutdown = Shutdown::new();
        let p = pool(1, &shutdown);
        p.release();
        assert!(p.is_released());
        assert_eq!(p.submit(async {}), Err(PoolError::Released("test")));
    }

    #[tokio::test]
    async fn queued_jobs_drain_after_release() {
        let shutdown = Shutdown::new();
        let p = pool(1, &shutdown);
        let (tx, rx) = oneshot::channel();
        p.submit(async {}).unwrap();
        p.submit(async move {
            let _ = tx.send(7);
        })
        .unwrap();
        p.release();
        assert_eq!(rx.await.unwrap(), 7);
        shutdown.wait().await;
        assert_eq!(p.live_workers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_workers_are_reclaimed() {
        let shutdown = Shutdown::new();
        let p = WorkerPool::new("idle", 4, Duration::from_secs(600), &shutdown);
        let (tx, rx) = oneshot::channel();
        p.submit(async move {
            let _ = tx.send(());
        })
        .unwrap();
        rx.await.unwrap();
        assert_eq!(p.live_workers(), 1);
        tokio::time::sleep(Duration::from_secs(601)).await;
        assert_eq!(p.live_workers(), 0);

        // The pool keeps working after reclaiming.
        let (tx, rx) = oneshot::channel();
        p.submit(async move {
            let _ = tx.send(());
        })
        .unwrap();
        rx.await.unwrap();
    }

    #[tokio::test]
    async fn cancellation_skips_queued_jobs() {
        let shutdown = Shutdown::new();
        let p = pool(1, &shutdown);
        let gate = Arc::new(Notify::new());
        let started = Arc::new(Notify::new());
        let ran_second = Arc::new(AtomicBool::new(false));
        {
            let gate = Arc::clone(&gate);
            let started = Arc::clone(&started);
            p.submit(async move {
                started.notify_one();
                gate.notified().await;
            })
            .unwrap();
        }
        {
            let ran_second = Arc::clone(&ran_second);
            p.submit(async move {
                ran_second.store(true, Ordering::SeqCst);
            })
            .unwrap();
        }
        started.notified().await;
        shutdown.cancel();
        gate.notify_one();
        shutdown.wait().await;
        assert!(!ran_second.load(Ordering::SeqCst));
        assert_eq!(p.live_workers(), 0);
    }
}
