//! Merge/transfer: ordered concatenation of downloaded segments.
//!
//! The merge tool is invoked on at most `batch_size` segments at a time. A
//! rolling accumulator (`ts_<i32::MAX>.ts`) carries the result forward: each
//! batch reads the accumulator first, writes a staged output, the consumed
//! accumulator is deleted, and the staged output becomes the new
//! accumulator. The last accumulator is finalized into the output path.

mod tool;

pub use tool::{FfmpegTool, MergeTool, NativeConcat};

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::config::{MergeConfig, MergeToolKind};
use crate::storage::{remove_if_exists, ts_file_name};

/// Default number of segments per tool invocation.
pub const DEFAULT_BATCH_SIZE: usize = 50;

const STAGED_NAME: &str = "merge_staged.ts";

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("merge tool exited with {status:?}: {stderr}")]
    ToolFailed { status: Option<i32>, stderr: String },
    #[error("merge io: {0}")]
    Io(std::io::Error),
    #[error("{0}")]
    Unsupported(&'static str),
    #[error("nothing to merge")]
    NoInputs,
    #[error("merge produced no output at {0}")]
    MissingOutput(PathBuf),
}

pub fn build_tool(cfg: &MergeConfig) -> Arc<dyn MergeTool> {
    match cfg.tool {
        MergeToolKind::Ffmpeg => Arc::new(FfmpegTool::new(cfg.ffmpeg_path.clone())),
        MergeToolKind::Native => Arc::new(NativeConcat),
    }
}

fn segment_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^ts_(\d+)\.ts$").expect("segment name pattern"))
}

/// Index encoded in a `ts_<n>.ts` file name.
pub fn segment_index(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    segment_name_re().captures(name)?.get(1)?.as_str().parse().ok()
}

/// Path of the rolling accumulator inside `ts_dir`.
pub fn rolling_path(ts_dir: &Path) -> PathBuf {
    ts_dir.join(ts_file_name(i32::MAX as usize))
}

/// Every `ts_<n>.ts` in `ts_dir` except the accumulator, sorted by index.
pub fn collect_segments(ts_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let rolling = i32::MAX as u64;
    let mut found: Vec<(u64, PathBuf)> = std::fs::read_dir(ts_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter_map(|p| segment_index(&p).map(|i| (i, p)))
        .filter(|(i, _)| *i != rolling)
        .collect();
    found.sort_by_key(|(i, _)| *i);
    Ok(found.into_iter().map(|(_, p)| p).collect())
}

/// Batched, ordered concatenation through a `MergeTool`.
#[derive(Clone)]
pub struct Transfer {
    tool: Arc<dyn MergeTool>,
    batch_size: usize,
}

impl Transfer {
    pub fn new(tool: Arc<dyn MergeTool>, batch_size: usize) -> Self {
        Self {
            tool,
            batch_size: batch_size.max(1),
        }
    }

    pub fn from_config(cfg: &MergeConfig) -> Self {
        Self::new(build_tool(cfg), cfg.batch_size)
    }

    pub fn tool(&self) -> &Arc<dyn MergeTool> {
        &self.tool
    }

    /// Concatenate `ordered` (already in merge order) into `output`, `batch_size` at a time.
    pub async fn concatenate_segments(
        &self,
        ts_dir: &Path,
        ordered: &[PathBuf],
        output: &Path,
    ) -> Result<(), MergeError> {
        let rolling = rolling_path(ts_dir);
        let staged = ts_dir.join(STAGED_NAME);
        remove_if_exists(&rolling).map_err(MergeError::Io)?;
        remove_if_exists(&staged).map_err(MergeError::Io)?;

        let segments: Vec<&PathBuf> = ordered.iter().filter(|p| **p != rolling).collect();
        if segments.is_empty() {
            return Err(MergeError::NoInputs);
        }

        let batches = segments.len().div_ceil(self.batch_size);
        for (n, batch) in segments.chunks(self.batch_size).enumerate() {
            let mut inputs = Vec::with_capacity(batch.len() + 1);
            let has_rolling = n > 0;
            if has_rolling {
                inputs.push(rolling.clone());
            }
            inputs.extend(batch.iter().map(|p| (*p).clone()));
            tracing::debug!(
                batch = n + 1,
                batches,
                inputs = inputs.len(),
                tool = self.tool.name(),
                "merging batch"
            );
            self.tool.concat(&inputs, &staged).await?;
            if !staged.exists() {
                return Err(MergeError::MissingOutput(staged));
            }
            if has_rolling {
                remove_if_exists(&rolling).map_err(MergeError::Io)?;
            }
            tokio::fs::rename(&staged, &rolling)
                .await
                .map_err(MergeError::Io)?;
        }

        self.tool.finalize(&rolling, output).await?;
        remove_if_exists(&rolling).map_err(MergeError::Io)?;
        Ok(())
    }

    /// Merge whatever `ts_<n>.ts` files sit in `ts_dir` (recovery of an interrupted job).
    pub async fn merge_dir(&self, ts_dir: &Path, output: &Path) -> Result<(), MergeError> {
        let segments = collect_segments(ts_dir).map_err(MergeError::Io)?;
        self.concatenate_segments(ts_dir, &segments, output).await
    }

    pub async fn mux(&self, parts: &[PathBuf], output: &Path) -> Result<(), MergeError> {
        self.tool.mux(parts, output).await
    }
}
