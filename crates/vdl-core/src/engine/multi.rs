//! Multi-stream jobs: each sub-link (e.g. separate video and audio) is fetched
//! into its own part file, then the parts are muxed into the output.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{download_link, EngineContext, EngineError, Reporter};
use crate::fetch::{with_default_headers, RequestTemplate};
use crate::storage::{part_path, remove_if_exists};
use crate::task::TaskStatus;

pub(super) async fn download_streams(
    ctx: &EngineContext,
    links: &[&str],
    headers: &HashMap<String, String>,
    output: &Path,
    reporter: &Reporter,
) -> Result<(), EngineError> {
    let count = links.len();
    let mut parts: Vec<PathBuf> = Vec::with_capacity(count);
    for (i, link) in links.iter().enumerate() {
        let part = part_path(output, i);
        tracing::info!(part = i + 1, of = count, link, "fetching stream");
        reporter.note(format!("fetching stream {}/{}", i + 1, count));
        let tmpl = RequestTemplate::new(*link, with_default_headers(headers.clone(), link));
        download_link(ctx, &tmpl, &part, &reporter.for_part(i + 1, count)).await?;
        parts.push(part);
    }

    reporter.status(TaskStatus::Transferring, format!("muxing {} streams", count));
    remove_if_exists(output)
        .map_err(|e| EngineError::Fatal(format!("remove stale {}: {}", output.display(), e)))?;
    ctx.transfer.mux(&parts, output).await?;
    for part in &parts {
        if let Err(e) = remove_if_exists(part) {
            tracing::warn!(part = %part.display(), "failed to remove stream part: {}", e);
        }
    }
    Ok(())
}
