//! Download engines: progressive MP4 (ranged chunks) and HLS (playlist segments).
//!
//! An engine turns one media link into one output file. Units of work (byte
//! ranges or segments) run either one at a time on the job task or fanned out
//! to the shared chunk pool, depending on `DownloadMode`. A shared flag stops
//! queued units from starting once any sibling failed.

mod fragment;
mod m3u8;
mod mp4;
mod multi;

pub use fragment::download_fragment;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::{DownloadMode, VdlConfig};
use crate::fetch::{is_hls_content_type, probe_content_type, FetchContext, FetchError, RequestTemplate};
use crate::merge::{MergeError, Transfer};
use crate::playlist::PlaylistError;
use crate::pool::{PoolError, WorkerPool};
use crate::retry::{Classify, RetryPolicy};
use crate::segmenter::SplitParams;
use crate::task::{link, DownloadTask, TaskHandle, TaskStatus};

/// Snapshot of one job's progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Chunks or segments finished.
    pub current: usize,
    pub total: usize,
    pub current_bytes: u64,
    /// Zero when the size is unknown (playlists).
    pub total_bytes: u64,
    /// 1-based position of the sub-link being fetched.
    pub current_task: usize,
    pub total_tasks: usize,
}

impl Progress {
    /// Fraction of units complete in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.current as f64 / self.total as f64).min(1.0)
    }
}

/// What the orchestrator should do with a task whose download failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Sweep partial output and append to the download queue.
    Requeue,
    /// The resolved link went stale: send the source reference back to resolution.
    Reresolve,
    /// Give up. `keep_artifacts` leaves temp files in place for inspection or recovery.
    Abandon { keep_artifacts: bool },
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0}")]
    Fatal(String),
    #[error("{0}")]
    Retryable(String),
    #[error("not a valid playlist: {0}")]
    InvalidPlaylist(String),
    #[error(transparent)]
    PoolReleased(#[from] PoolError),
    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),
    #[error("cancelled")]
    Cancelled,
}

impl EngineError {
    pub fn disposition(&self) -> Disposition {
        match self {
            EngineError::Retryable(_) => Disposition::Requeue,
            EngineError::InvalidPlaylist(_) => Disposition::Reresolve,
            EngineError::Fatal(_) | EngineError::PoolReleased(_) => {
                Disposition::Abandon { keep_artifacts: false }
            }
            EngineError::Merge(_) | EngineError::Cancelled => Disposition::Abandon { keep_artifacts: true },
        }
    }

    pub(crate) fn storage(e: anyhow::Error) -> Self {
        EngineError::Fatal(format!("{:#}", e))
    }
}

impl From<FetchError> for EngineError {
    fn from(e: FetchError) -> Self {
        if matches!(e, FetchError::Cancelled) {
            return EngineError::Cancelled;
        }
        if e.kind().is_retryable() {
            EngineError::Retryable(e.to_string())
        } else {
            EngineError::Fatal(e.to_string())
        }
    }
}

impl From<PlaylistError> for EngineError {
    fn from(e: PlaylistError) -> Self {
        match e {
            PlaylistError::InvalidContentType(ct) => EngineError::InvalidPlaylist(ct),
            PlaylistError::Fetch(e) => e.into(),
            other => EngineError::Fatal(other.to_string()),
        }
    }
}

/// Which engine handles a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Mp4,
    M3u8,
}

/// Collaborators and settings shared by every job.
#[derive(Clone)]
pub struct EngineContext {
    pub fetch: FetchContext,
    pub chunk_pool: WorkerPool,
    pub transfer: Transfer,
    /// Per-request retry (probes, chunks, segments, playlists).
    pub retry: RetryPolicy,
    /// Head+body+merge attempts for fragmented segments.
    pub fragment_retry: RetryPolicy,
    pub split: SplitParams,
    pub mode: DownloadMode,
    pub ts_dir_suffix: String,
}

impl EngineContext {
    pub fn new(cfg: &VdlConfig, fetch: FetchContext, chunk_pool: WorkerPool) -> Self {
        Self {
            fetch,
            chunk_pool,
            transfer: Transfer::from_config(&cfg.merge),
            retry: RetryPolicy::from(&cfg.retry),
            fragment_retry: RetryPolicy::new(
                cfg.merge.fragment_retries,
                Duration::from_secs_f64(cfg.merge.fragment_retry_delay_secs.max(0.0)),
            ),
            split: SplitParams::from(&cfg.split),
            mode: cfg.mode,
            ts_dir_suffix: cfg.ts_dir_suffix.clone(),
        }
    }
}

/// Progress and status sink for one job, aware of its sub-link position.
#[derive(Debug, Clone)]
pub struct Reporter {
    handle: Arc<TaskHandle>,
    task_index: usize,
    task_count: usize,
}

impl Reporter {
    pub fn new(handle: Arc<TaskHandle>) -> Self {
        Self {
            handle,
            task_index: 1,
            task_count: 1,
        }
    }

    fn for_part(&self, index: usize, count: usize) -> Self {
        Self {
            handle: Arc::clone(&self.handle),
            task_index: index,
            task_count: count,
        }
    }

    pub fn progress(&self, mut p: Progress) {
        p.current_task = self.task_index;
        p.total_tasks = self.task_count;
        self.handle.progress(p);
    }

    pub fn status(&self, status: TaskStatus, hint: impl Into<String>) {
        self.handle.set(status, hint);
    }

    pub fn note(&self, hint: impl Into<String>) {
        self.handle.note(hint);
    }

    /// Report a merge step. A part of a multi-stream job only updates the
    /// hint; the job enters `Transferring` once, for the final mux.
    pub fn merging(&self, hint: impl Into<String>) {
        if self.task_count > 1 {
            self.handle.note(format!(
                "stream {}/{}: {}",
                self.task_index,
                self.task_count,
                hint.into()
            ));
        } else {
            self.handle.set(TaskStatus::Transferring, hint);
        }
    }
}

fn is_remote(link: &str) -> bool {
    let lower = link.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn looks_like_playlist(link: &str) -> bool {
    let path = link.split(['?', '#']).next().unwrap_or_default();
    path.to_ascii_lowercase().ends_with(".m3u8")
}

/// Pick the engine for one link.
///
/// Links whose path ends in `.m3u8` go straight to the playlist engine, which
/// validates the content type itself. Other remote links are probed. Local
/// links must be playlists.
pub async fn select_engine(ctx: &EngineContext, tmpl: &RequestTemplate) -> Result<EngineKind, EngineError> {
    if looks_like_playlist(&tmpl.url) {
        return Ok(EngineKind::M3u8);
    }
    if !is_remote(&tmpl.url) {
        if tmpl.url.to_ascii_lowercase().starts_with("file:") {
            return Ok(EngineKind::M3u8);
        }
        return Err(EngineError::Fatal(format!("unsupported local source {}", tmpl.url)));
    }
    let content_type = probe_content_type(&ctx.fetch.client, tmpl, &ctx.retry, &ctx.fetch.cancel).await?;
    tracing::debug!(url = %tmpl.url, %content_type, "probed content type");
    Ok(if is_hls_content_type(&content_type) {
        EngineKind::M3u8
    } else {
        EngineKind::Mp4
    })
}

/// Download `task` into `output`. Multi-link tasks are fetched part by part and muxed.
pub async fn download(
    ctx: &EngineContext,
    task: &DownloadTask,
    output: &Path,
) -> Result<PathBuf, EngineError> {
    let reporter = Reporter::new(Arc::clone(&task.handle));
    let links = link::split_links(&task.link);
    match links.as_slice() {
        [] => Err(EngineError::Fatal("task has no link".to_string())),
        [single] => {
            let tmpl = RequestTemplate::new(*single, task.headers.clone());
            download_link(ctx, &tmpl, output, &reporter).await?;
            Ok(output.to_path_buf())
        }
        many => {
            multi::download_streams(ctx, many, &task.headers, output, &reporter).await?;
            Ok(output.to_path_buf())
        }
    }
}

/// Select an engine for one link and run it.
pub(crate) async fn download_link(
    ctx: &EngineContext,
    tmpl: &RequestTemplate,
    output: &Path,
    reporter: &Reporter,
) -> Result<(), EngineError> {
    match select_engine(ctx, tmpl).await? {
        EngineKind::Mp4 => mp4::download(ctx, tmpl, output, reporter).await,
        EngineKind::M3u8 => m3u8::download(ctx, tmpl, output, reporter).await,
    }
}

/// Run `work` over every unit, sequentially or on the chunk pool per `ctx.mode`.
///
/// In pool mode every unit is submitted up front; once one fails, units that
/// have not started yet return without doing IO. Waits for all submitted
/// units and returns the first error.
pub(crate) async fn run_units<U, F, Fut>(
    ctx: &EngineContext,
    units: Vec<U>,
    work: F,
) -> Result<(), EngineError>
where
    U: Send + 'static,
    F: Fn(U) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), EngineError>> + Send + 'static,
{
    let cancel = ctx.fetch.cancel.clone();
    if ctx.mode == DownloadMode::Simple {
        for unit in units {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            work(unit).await?;
        }
        return Ok(());
    }

    let total = units.len();
    let work = Arc::new(work);
    let failed = Arc::new(AtomicBool::new(false));
    let (tx, mut rx) = mpsc::unbounded_channel::<Result<(), EngineError>>();
    let mut first_err = None;
    for unit in units {
        let job = Arc::clone(&work);
        let gate = Arc::clone(&failed);
        let unit_cancel = cancel.clone();
        let unit_tx = tx.clone();
        let submitted = ctx.chunk_pool.submit(async move {
            if gate.load(Ordering::SeqCst) || unit_cancel.is_cancelled() {
                return;
            }
            let res = (*job)(unit).await;
            if res.is_err() {
                gate.store(true, Ordering::SeqCst);
            }
            let _ = unit_tx.send(res);
        });
        if let Err(e) = submitted {
            // Units already handed to the pool may be writing; wait for them below.
            failed.store(true, Ordering::SeqCst);
            first_err = Some(EngineError::from(e));
            break;
        }
    }
    drop(tx);

    let mut finished = 0usize;
    while let Some(res) = rx.recv().await {
        match res {
            Ok(()) => finished += 1,
            Err(e) => {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
    }
    if let Some(e) = first_err {
        return Err(e);
    }
    if finished < total {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        return Err(EngineError::Retryable(format!(
            "{} of {} units never ran",
            total - finished,
            total
        )));
    }
    Ok(())
}
