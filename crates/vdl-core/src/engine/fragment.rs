//! Fragmented segments: an init header plus a body, merged into one `.ts`.

use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::{EngineContext, EngineError};
use crate::fetch::{flatten_retry, FetchError, RequestTemplate};
use crate::retry::run_with_retry;

const TEMP_NAME_LEN: usize = 32;

fn temp_segment(dir: &Path) -> Result<NamedTempFile, EngineError> {
    tempfile::Builder::new()
        .prefix("")
        .suffix(".ts")
        .rand_bytes(TEMP_NAME_LEN)
        .tempfile_in(dir)
        .map_err(|e| EngineError::Fatal(format!("create temp segment in {}: {}", dir.display(), e)))
}

/// Plain GET of `tmpl` into `path`, retried per `ctx.retry`.
pub(super) async fn fetch_whole(
    ctx: &EngineContext,
    tmpl: &RequestTemplate,
    path: &Path,
) -> Result<u64, FetchError> {
    let fetch = &ctx.fetch;
    flatten_retry(
        run_with_retry(&ctx.retry, &fetch.cancel, &tmpl.url, |_| fetch.fetch_to_file(tmpl, path)).await,
    )
}

/// Download `head_url` and `body_url` to two random temporaries in `work_dir`
/// and merge them into `dest`.
///
/// A failed merge repeats the whole head, body, merge sequence until
/// `ctx.fragment_retry` is spent. Temporaries are removed on every path.
pub async fn download_fragment(
    ctx: &EngineContext,
    tmpl: &RequestTemplate,
    head_url: &str,
    body_url: &str,
    work_dir: &Path,
    dest: &Path,
) -> Result<(), EngineError> {
    let policy = ctx.fragment_retry;
    let head_tmpl = tmpl.with_url(head_url);
    let body_tmpl = tmpl.with_url(body_url);
    let mut attempt = 1u32;
    loop {
        if ctx.fetch.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let head = temp_segment(work_dir)?;
        let body = temp_segment(work_dir)?;
        fetch_whole(ctx, &head_tmpl, head.path()).await?;
        fetch_whole(ctx, &body_tmpl, body.path()).await?;

        let inputs: [PathBuf; 2] = [head.path().to_path_buf(), body.path().to_path_buf()];
        let merged = ctx.transfer.tool().concat(&inputs, dest).await;
        drop(head);
        drop(body);
        let err = match merged {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        if attempt >= policy.max_attempts {
            tracing::error!(dest = %dest.display(), attempts = attempt, "fragment merge gave up: {}", err);
            return Err(EngineError::Merge(err));
        }
        tracing::warn!(dest = %dest.display(), attempt, "fragment merge failed, retrying: {}", err);
        tokio::select! {
            _ = ctx.fetch.cancel.cancelled() => return Err(EngineError::Cancelled),
            _ = tokio::time::sleep(policy.delay) => {}
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_names_are_random_ts_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = temp_segment(dir.path()).unwrap();
        let b = temp_segment(dir.path()).unwrap();
        let name = a.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.ends_with(".ts"));
        assert_eq!(name.len(), TEMP_NAME_LEN + 3);
        assert_ne!(a.path(), b.path());
        let path = a.path().to_path_buf();
        drop(a);
        assert!(!path.exists());
    }
}
