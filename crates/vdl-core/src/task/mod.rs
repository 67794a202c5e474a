//! Task model: source references waiting for resolution, resolved download
//! tasks, the queues between them, and resolve-loop pacing.

mod deque;
pub mod link;
mod status;
mod ticker;

pub use deque::TaskDeque;
pub use status::{EventSender, TaskEvent, TaskEventKind, TaskHandle, TaskStatus};
pub use ticker::GrowableTicker;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Extension given to every final output.
pub const OUTPUT_EXTENSION: &str = "mp4";

/// An unresolved reference: a display name plus the page or media URL.
#[derive(Debug, Clone)]
pub struct SourceTask {
    pub name: String,
    pub url: String,
    pub handle: Arc<TaskHandle>,
    /// Download attempts already spent (carried across re-resolution).
    pub attempts: u32,
}

impl SourceTask {
    pub fn new(name: impl Into<String>, url: impl Into<String>, events: Option<EventSender>) -> Self {
        let name = name.into();
        Self {
            handle: Arc::new(TaskHandle::new(name.clone(), events)),
            name,
            url: url.into(),
            attempts: 0,
        }
    }
}

/// One resolved media resource to fetch.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    /// Direct media link; may pack several sub-links (see `link`).
    pub link: String,
    /// Display name until the job starts, then the final output path.
    pub file_name: String,
    /// Source reference it was resolved from (used to re-resolve).
    pub origin_url: String,
    pub headers: HashMap<String, String>,
    pub handle: Arc<TaskHandle>,
    /// Failed download attempts so far.
    pub attempts: u32,
}

impl DownloadTask {
    pub fn from_source(source: &SourceTask, link: String, headers: HashMap<String, String>) -> Self {
        Self {
            link,
            file_name: source.name.clone(),
            origin_url: source.url.clone(),
            headers,
            handle: Arc::clone(&source.handle),
            attempts: source.attempts,
        }
    }

    /// Back to a source reference for re-resolution.
    pub fn to_source(&self) -> SourceTask {
        SourceTask {
            name: self.handle.name().to_string(),
            url: self.origin_url.clone(),
            handle: Arc::clone(&self.handle),
            attempts: self.attempts,
        }
    }

    pub fn sub_links(&self) -> Vec<&str> {
        link::split_links(&self.link)
    }
}

/// `<download_dir>/<name>.mp4`, with path separators in `name` replaced.
pub fn final_path(download_dir: &Path, name: &str) -> PathBuf {
    let clean: String = name
        .trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();
    download_dir.join(format!("{}.{}", clean, OUTPUT_EXTENSION))
}
