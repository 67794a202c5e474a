//! Download loop: download queue to the job pool, with requeue on failure.

use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::Shared;
use crate::engine::{self, Disposition, EngineError};
use crate::storage::{part_path, remove_entry, sweep_prefixed, ts_dir_path};
use crate::task::{final_path, DownloadTask, TaskStatus};

pub(super) async fn download_loop(shared: Arc<Shared>, stop: CancellationToken) {
    tracing::info!("download loop started");
    loop {
        if stop.is_cancelled() {
            break;
        }
        let Some(task) = shared.download.pop_front() else {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = tokio::time::sleep(shared.poll_interval) => continue,
            }
        };
        let handle = Arc::clone(&task.handle);
        let job = run_job(Arc::clone(&shared), task);
        if let Err(e) = shared.job_pool.submit(job) {
            shared.finish_failed(&handle, e.to_string());
        }
    }
    tracing::info!("download loop stopped");
}

/// Remove the output, its segment dir, and the `parts` stream files of a
/// multi-link job (with their segment dirs). Other tasks' files are left alone
/// even when their names share the `<stem>_part` prefix.
fn sweep_partial(output: &Path, ts_dir_suffix: &str, parts: usize) {
    let (Some(dir), Some(name)) = (output.parent(), output.file_name()) else {
        return;
    };
    let name = name.to_string_lossy();
    match sweep_prefixed(dir, &name) {
        Ok(0) => {}
        Ok(n) => tracing::debug!(prefix = %name, removed = n, "swept partial output"),
        Err(e) => tracing::warn!(prefix = %name, "sweep failed: {:#}", e),
    }
    if parts < 2 {
        return;
    }
    for i in 0..parts {
        let part = part_path(output, i);
        for path in [ts_dir_path(&part, ts_dir_suffix), part] {
            match remove_entry(&path) {
                Ok(true) => tracing::debug!(path = %path.display(), "swept stream part"),
                Ok(false) => {}
                Err(e) => tracing::warn!(path = %path.display(), "sweep failed: {}", e),
            }
        }
    }
}

async fn run_job(shared: Arc<Shared>, mut task: DownloadTask) {
    let handle = Arc::clone(&task.handle);
    let output = final_path(&shared.cfg.download_dir, handle.name());
    task.file_name = output.display().to_string();
    handle.set(TaskStatus::Downloading, format!("downloading to {}", output.display()));

    let err = match engine::download(&shared.engine, &task, &output).await {
        Ok(path) => {
            shared.finish_ok(&handle, path);
            return;
        }
        Err(e) => e,
    };

    let disposition = err.disposition();
    if !matches!(disposition, Disposition::Abandon { keep_artifacts: true }) {
        sweep_partial(&output, &shared.cfg.ts_dir_suffix, task.sub_links().len());
    }
    task.file_name = handle.name().to_string();
    task.attempts += 1;
    let max = shared.cfg.max_download_attempts;
    match disposition {
        Disposition::Requeue | Disposition::Reresolve if task.attempts > max => {
            shared.finish_failed(
                &handle,
                format!("gave up after {} failed attempt(s): {}", task.attempts, err),
            );
        }
        Disposition::Requeue => {
            tracing::warn!(name = %handle.name(), attempt = task.attempts, "download failed, requeued: {}", err);
            handle.note(format!("download failed, waiting to retry: {}", err));
            shared.download.push_back(task);
        }
        Disposition::Reresolve => {
            tracing::warn!(name = %handle.name(), "link is stale, re-resolving: {}", err);
            handle.note("link expired, waiting for re-resolution");
            shared.decode.push_back(task.to_source());
        }
        Disposition::Abandon { .. } => {
            let msg = match err {
                EngineError::Cancelled => "cancelled".to_string(),
                other => other.to_string(),
            };
            shared.finish_failed(&handle, msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_keeps_other_tasks_part_named_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for name in ["a.mp4", "a_part0.mp4", "a_part1.mp4", "a_part2.mp4", "b.mp4"] {
            std::fs::write(root.join(name), b"x").unwrap();
        }
        std::fs::create_dir(root.join("a_part1.mp4_temp_ts_files")).unwrap();
        std::fs::create_dir(root.join("a.mp4_temp_ts_files")).unwrap();

        sweep_partial(&root.join("a.mp4"), "temp_ts_files", 2);

        for gone in ["a.mp4", "a.mp4_temp_ts_files", "a_part0.mp4", "a_part1.mp4", "a_part1.mp4_temp_ts_files"] {
            assert!(!root.join(gone).exists(), "{} survived", gone);
        }
        // "a_part2" is its own task here; "a" only ever had two parts.
        assert!(root.join("a_part2.mp4").exists());
        assert!(root.join("b.mp4").exists());
    }

    #[test]
    fn single_link_sweep_leaves_part_named_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join("a.mp4"), b"x").unwrap();
        std::fs::write(root.join("a_part0.mp4"), b"x").unwrap();
        sweep_partial(&root.join("a.mp4"), "temp_ts_files", 1);
        assert!(!root.join("a.mp4").exists());
        assert!(root.join("a_part0.mp4").exists());
    }
}
