//! Resolve loop: decode queue to download queue, paced by a `GrowableTicker`.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::Shared;
use crate::fetch::with_default_headers;
use crate::resolver::{ResolveError, ResolvedMedia, Resolver};
use crate::retry::{run_with_retry, RetryError, RetryPolicy};
use crate::task::{DownloadTask, GrowableTicker, TaskStatus};

/// Resolve `source`, retrying network failures up to `policy.max_attempts` attempts.
pub async fn resolve_with_retry(
    resolver: &dyn Resolver,
    source: &str,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<ResolvedMedia, RetryError<ResolveError>> {
    run_with_retry(policy, cancel, "resolve", |_| resolver.resolve(source)).await
}

pub(super) async fn resolve_loop(shared: Arc<Shared>, stop: CancellationToken) {
    let cfg = &shared.cfg;
    let policy = RetryPolicy::new(
        cfg.resolver.max_retries,
        Duration::from_secs(cfg.resolver.retry_delay_secs),
    );
    let mut ticker = GrowableTicker::from(&cfg.pacing);
    tracing::info!("resolve loop started");
    loop {
        if stop.is_cancelled() {
            break;
        }
        let Some(source) = shared.decode.pop_front() else {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = tokio::time::sleep(shared.poll_interval) => continue,
            }
        };

        source.handle.set(TaskStatus::Resolving, "resolving");
        let media = match resolve_with_retry(shared.resolver.as_ref(), &source.url, &policy, &stop).await {
            Ok(media) => media,
            Err(RetryError::Cancelled) => break,
            Err(RetryError::Exhausted { error, attempts }) => {
                shared.finish_failed(
                    &source.handle,
                    format!("resolve failed after {} attempt(s): {}", attempts, error),
                );
                continue;
            }
        };

        let first = media.links.first().cloned().unwrap_or_default();
        let headers = with_default_headers(media.headers.clone(), &first);
        let task = DownloadTask::from_source(&source, media.joined(), headers);
        tracing::debug!(name = %source.name, links = media.links.len(), "resolved");
        source.handle.note("resolved, waiting for a download slot");
        shared.download.push_back(task);

        let pause = ticker.next();
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = shared.download_done.notified() => {
                tracing::debug!("a download finished, resolving next without waiting");
            }
            _ = tokio::time::sleep(pause) => {}
        }
    }
    tracing::info!("resolve loop stopped");
}
