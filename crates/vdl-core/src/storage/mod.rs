//! Disk layout and file lifecycle.
//!
//! Destination files are written positionally (`PositionalWriter`). HLS jobs
//! keep their segments in `<final>_<suffix>/ts_<index>.ts` until merged; that
//! directory is the on-disk recovery point. Failed jobs are cleaned up by
//! sweeping every entry whose name starts with the final file name.

mod writer;

pub use writer::PositionalWriter;

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Segment directory for a final output path: `<final>_<suffix>`.
pub fn ts_dir_path(final_path: &Path, suffix: &str) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push("_");
    o.push(suffix);
    PathBuf::from(o)
}

/// File name of segment `index` inside the segment directory.
pub fn ts_file_name(index: usize) -> String {
    format!("ts_{}.ts", index)
}

/// Create (if needed) the segment directory for `final_path`.
pub fn init_ts_dir(final_path: &Path, suffix: &str) -> Result<PathBuf> {
    let dir = ts_dir_path(final_path, suffix);
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// Path of sub-stream `index` for a multi-link job: `<stem>_part<index>.<ext>`.
pub fn part_path(final_path: &Path, index: usize) -> PathBuf {
    let stem = final_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match final_path.extension() {
        Some(ext) => format!("{}_part{}.{}", stem, index, ext.to_string_lossy()),
        None => format!("{}_part{}", stem, index),
    };
    final_path.with_file_name(name)
}

/// Remove every file or directory in `dir` whose name starts with `prefix`.
/// Returns how many entries were removed. A missing `dir` is not an error.
pub fn sweep_prefixed(dir: &Path, prefix: &str) -> Result<usize> {
    if prefix.is_empty() {
        anyhow::bail!("refusing to sweep {} with an empty prefix", dir.display());
    }
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e).with_context(|| format!("read {}", dir.display())),
    };
    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        if !entry.file_name().to_string_lossy().starts_with(prefix) {
            continue;
        }
        let path = entry.path();
        let res = if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        match res {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!(path = %path.display(), "sweep failed: {}", e),
        }
    }
    Ok(removed)
}

/// Delete the file or directory tree at `path`. Returns false when nothing was there.
pub fn remove_entry(path: &Path) -> std::io::Result<bool> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if meta.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(true)
}

/// Delete `path` if it exists.
pub fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
