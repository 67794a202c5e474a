//! Progressive download: size probe, randomized split, ranged chunk fetches
//! written positionally into one preallocated file.

use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use super::{run_units, EngineContext, EngineError, Progress, Reporter};
use crate::fetch::{flatten_retry, probe_size, RequestTemplate};
use crate::retry::run_with_retry;
use crate::segmenter::split_ranges;
use crate::storage::PositionalWriter;

pub(super) async fn download(
    ctx: &EngineContext,
    tmpl: &RequestTemplate,
    output: &Path,
    reporter: &Reporter,
) -> Result<(), EngineError> {
    let fetch = &ctx.fetch;
    let total_bytes = probe_size(&fetch.client, tmpl, &ctx.retry, &fetch.cancel).await?;
    let ranges = split_ranges(total_bytes, ctx.split);
    let total = ranges.len();
    tracing::info!(url = %tmpl.url, total_bytes, chunks = total, mode = ?ctx.mode, "mp4 download");

    let writer = PositionalWriter::create_sized(output, total_bytes).map_err(EngineError::storage)?;
    let done = Arc::new(AtomicUsize::new(0));
    let done_bytes = Arc::new(AtomicU64::new(0));
    reporter.progress(Progress {
        total,
        total_bytes,
        ..Default::default()
    });

    let fetch = fetch.clone();
    let policy = ctx.retry;
    let tmpl = Arc::new(tmpl.clone());
    let reporter_c = reporter.clone();
    let writer_c = writer.clone();
    run_units(ctx, ranges, move |range| {
        let fetch = fetch.clone();
        let tmpl = Arc::clone(&tmpl);
        let writer = writer_c.clone();
        let reporter = reporter_c.clone();
        let done = Arc::clone(&done);
        let done_bytes = Arc::clone(&done_bytes);
        async move {
            let label = format!("chunk {}-{}", range.from, range.to);
            let written = flatten_retry(
                run_with_retry(&policy, &fetch.cancel, &label, |_| {
                    fetch.fetch_into(&tmpl, Some(range), &writer)
                })
                .await,
            )?;
            let current = done.fetch_add(1, Ordering::SeqCst) + 1;
            let current_bytes = done_bytes.fetch_add(written, Ordering::SeqCst) + written;
            reporter.progress(Progress {
                current,
                total,
                current_bytes,
                total_bytes,
                ..Default::default()
            });
            Ok(())
        }
    })
    .await?;

    writer.sync().map_err(EngineError::storage)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::tests::test_context;
    use super::*;
    use crate::config::DownloadMode;
    use crate::control::Shutdown;
    use crate::task::TaskHandle;

    #[tokio::test]
    async fn unreachable_source_is_retryable() {
        let shutdown = Shutdown::new();
        let mut ctx = test_context(DownloadMode::MultiThread, 2, &shutdown);
        ctx.retry = crate::retry::RetryPolicy::new(2, std::time::Duration::from_millis(1));
        let dir = tempfile::tempdir().unwrap();
        let tmpl = RequestTemplate::new("http://127.0.0.1:1/video.mp4", Default::default());
        let reporter = Reporter::new(Arc::new(TaskHandle::new("v", None)));
        let res = download(&ctx, &tmpl, &dir.path().join("v.mp4"), &reporter).await;
        assert!(matches!(res, Err(EngineError::Retryable(_))), "{:?}", res);
    }
}
