//! Task orchestrator: a resolve loop feeding a download loop through two deques.
//!
//! Source references wait in the decode queue until the resolver turns them
//! into `DownloadTask`s on the download queue. The download loop hands each
//! task to the job pool, where an engine runs it. Failures are requeued,
//! sent back for re-resolution, or abandoned per `EngineError::disposition`.
//! `run` returns once every task reached a terminal state or shutdown fired.

mod download;
mod resolve;

pub use resolve::resolve_with_retry;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::config::VdlConfig;
use crate::control::Shutdown;
use crate::engine::EngineContext;
use crate::fetch::{build_client, FetchContext};
use crate::pool::WorkerPool;
use crate::rate_limit::RateLimiter;
use crate::resolver::Resolver;
use crate::task::{DownloadTask, SourceTask, TaskDeque, TaskHandle};

/// How long an idle loop sleeps before looking at its queue again.
pub const QUEUE_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Telemetry interval of the shared rate limiter.
pub const METER_INTERVAL: Duration = Duration::from_secs(2);

/// Outcome of one `run`.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub completed: Vec<PathBuf>,
    /// `(task name, last error)`
    pub failed: Vec<(String, String)>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// State shared by both loops and every job.
pub(crate) struct Shared {
    pub(crate) cfg: Arc<VdlConfig>,
    pub(crate) resolver: Arc<dyn Resolver>,
    pub(crate) engine: EngineContext,
    pub(crate) job_pool: WorkerPool,
    pub(crate) decode: TaskDeque<SourceTask>,
    pub(crate) download: TaskDeque<DownloadTask>,
    /// Signalled after each successful download so the resolve loop can cut its pause short.
    pub(crate) download_done: Notify,
    pub(crate) poll_interval: Duration,
    remaining: AtomicUsize,
    all_done: Notify,
    summary: Mutex<RunSummary>,
}

impl Shared {
    pub(crate) fn finish_ok(&self, handle: &TaskHandle, path: PathBuf) {
        handle.complete(path.clone());
        self.summary
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .completed
            .push(path);
        self.download_done.notify_one();
        self.count_down();
    }

    pub(crate) fn finish_failed(&self, handle: &TaskHandle, error: String) {
        handle.fail(error.clone());
        self.summary
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .failed
            .push((handle.name().to_string(), error));
        self.count_down();
    }

    fn count_down(&self) {
        let prev = self.remaining.fetch_sub(1, Ordering::SeqCst);
        tracing::info!(remaining = prev.saturating_sub(1), "task finished");
        if prev <= 1 {
            self.all_done.notify_one();
        }
    }
}

pub struct Orchestrator {
    shared: Arc<Shared>,
    limiter: Arc<RateLimiter>,
    shutdown: Shutdown,
}

impl Orchestrator {
    /// Build the HTTP client, limiter, and both pools from `cfg`.
    pub fn new(cfg: VdlConfig, resolver: Arc<dyn Resolver>, shutdown: &Shutdown) -> Result<Self> {
        let cfg = cfg.normalized();
        let limit = cfg.rate_limit().context("rate limit")?;
        let limiter = Arc::new(RateLimiter::new(limit));
        let client = build_client().context("build http client")?;
        let fetch = FetchContext {
            client,
            limiter: Arc::clone(&limiter),
            cancel: shutdown.token().clone(),
        };
        let chunk_pool = WorkerPool::new("chunk", cfg.chunk_pool_size, cfg.pool_idle_timeout(), shutdown);
        let job_pool = WorkerPool::new("job", cfg.job_pool_size, cfg.pool_idle_timeout(), shutdown);
        let engine = EngineContext::new(&cfg, fetch, chunk_pool);
        Ok(Self::with_parts(cfg, resolver, engine, job_pool, shutdown))
    }

    /// Assemble from prebuilt parts.
    pub fn with_parts(
        cfg: VdlConfig,
        resolver: Arc<dyn Resolver>,
        engine: EngineContext,
        job_pool: WorkerPool,
        shutdown: &Shutdown,
    ) -> Self {
        let limiter = Arc::clone(&engine.fetch.limiter);
        Self {
            shared: Arc::new(Shared {
                cfg: Arc::new(cfg),
                resolver,
                engine,
                job_pool,
                decode: TaskDeque::new(),
                download: TaskDeque::new(),
                download_done: Notify::new(),
                poll_interval: QUEUE_POLL_INTERVAL,
                remaining: AtomicUsize::new(0),
                all_done: Notify::new(),
                summary: Mutex::new(RunSummary::default()),
            }),
            limiter,
            shutdown: shutdown.clone(),
        }
    }

    /// Override how often idle loops look at their queues. Only effective before `run`.
    pub fn with_poll_interval(mut self, every: Duration) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.poll_interval = every;
        }
        self
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Process `sources` to completion (or until shutdown).
    ///
    /// Both pools are released on return, so an orchestrator runs once.
    pub async fn run(&self, sources: Vec<SourceTask>) -> Result<RunSummary> {
        let shared = &self.shared;
        if sources.is_empty() {
            return Ok(RunSummary::default());
        }
        let dir = &shared.cfg.download_dir;
        std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        shared.remaining.store(sources.len(), Ordering::SeqCst);
        for src in sources {
            shared.decode.push_back(src);
        }

        let stop = self.shutdown.token().child_token();
        let meter = self.limiter.spawn_meter(METER_INTERVAL, stop.clone());
        self.shutdown
            .spawn(resolve::resolve_loop(Arc::clone(shared), stop.clone()));
        self.shutdown
            .spawn(download::download_loop(Arc::clone(shared), stop.clone()));

        self.wait_all(&stop).await;
        stop.cancel();
        let _ = meter.await;
        shared.job_pool.release();
        shared.engine.chunk_pool.release();

        let summary = shared
            .summary
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        tracing::info!(
            completed = summary.completed.len(),
            failed = summary.failed.len(),
            "run finished"
        );
        Ok(summary)
    }

    async fn wait_all(&self, stop: &CancellationToken) {
        while self.shared.remaining.load(Ordering::SeqCst) > 0 {
            tokio::select! {
                _ = stop.cancelled() => {
                    tracing::warn!("shutdown before all tasks finished");
                    return;
                }
                _ = self.shared.all_done.notified() => {}
            }
        }
    }
}
