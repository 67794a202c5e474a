//! HLS download: load the playlist, fetch every segment into the segment
//! directory, then merge them in index order.
//!
//! Segments are written to `ts_<index>.part.ts` and renamed when complete, so
//! a `ts_<index>.ts` left over from an interrupted run is reused as is.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::fragment::{download_fragment, fetch_whole};
use super::{run_units, EngineContext, EngineError, Progress, Reporter};
use crate::fetch::RequestTemplate;
use crate::playlist::{load_playlist, SegmentMeta};
use crate::storage::{init_ts_dir, remove_if_exists, ts_file_name};

fn segment_path(ts_dir: &Path, meta: &SegmentMeta) -> PathBuf {
    ts_dir.join(ts_file_name(meta.index))
}

async fn fetch_segment(
    ctx: &EngineContext,
    tmpl: &RequestTemplate,
    meta: &SegmentMeta,
    ts_dir: &Path,
) -> Result<(), EngineError> {
    let dest = segment_path(ts_dir, meta);
    if tokio::fs::metadata(&dest).await.map(|m| m.len() > 0).unwrap_or(false) {
        tracing::debug!(index = meta.index, "segment already on disk");
        return Ok(());
    }
    let part = ts_dir.join(format!("ts_{}.part.ts", meta.index));
    match &meta.head_url {
        None => {
            fetch_whole(ctx, &tmpl.with_url(meta.url.as_str()), &part).await?;
        }
        Some(head) => {
            download_fragment(ctx, tmpl, head, &meta.url, ts_dir, &part).await?;
        }
    }
    tokio::fs::rename(&part, &dest)
        .await
        .map_err(|e| EngineError::Fatal(format!("rename {}: {}", part.display(), e)))
}

pub(super) async fn download(
    ctx: &EngineContext,
    tmpl: &RequestTemplate,
    output: &Path,
    reporter: &Reporter,
) -> Result<(), EngineError> {
    let fetch = &ctx.fetch;
    let mut segments = load_playlist(&fetch.client, tmpl, &ctx.retry, &fetch.cancel).await?;
    segments.sort_by_key(|s| s.index);
    let total = segments.len();
    let ts_dir = init_ts_dir(output, &ctx.ts_dir_suffix).map_err(EngineError::storage)?;
    tracing::info!(
        url = %tmpl.url,
        segments = total,
        fragmented = segments.iter().filter(|s| s.head_url.is_some()).count(),
        ts_dir = %ts_dir.display(),
        "m3u8 download"
    );
    reporter.progress(Progress {
        total,
        ..Default::default()
    });

    let ordered: Vec<PathBuf> = segments.iter().map(|s| segment_path(&ts_dir, s)).collect();
    let done = Arc::new(AtomicUsize::new(0));
    let job_ctx = ctx.clone();
    let tmpl_c = Arc::new(tmpl.clone());
    let dir = Arc::new(ts_dir.clone());
    let reporter_c = reporter.clone();
    run_units(ctx, segments, move |meta| {
        let ctx = job_ctx.clone();
        let tmpl = Arc::clone(&tmpl_c);
        let dir = Arc::clone(&dir);
        let done = Arc::clone(&done);
        let reporter = reporter_c.clone();
        async move {
            fetch_segment(&ctx, &tmpl, &meta, &dir).await?;
            let current = done.fetch_add(1, Ordering::SeqCst) + 1;
            reporter.progress(Progress {
                current,
                total,
                ..Default::default()
            });
            Ok(())
        }
    })
    .await?;

    reporter.merging(format!("merging {} segments", total));
    remove_if_exists(output)
        .map_err(|e| EngineError::Fatal(format!("remove stale {}: {}", output.display(), e)))?;
    ctx.transfer.concatenate_segments(&ts_dir, &ordered, output).await?;

    if let Err(e) = tokio::fs::remove_dir_all(&ts_dir).await {
        tracing::warn!(ts_dir = %ts_dir.display(), "failed to remove segment dir: {}", e);
    }
    Ok(())
}
