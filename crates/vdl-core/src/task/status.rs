//! Per-task status, hints, and the event stream consumed by the CLI.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;

use crate::engine::Progress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TaskStatus {
    Waiting,
    Resolving,
    Downloading,
    Transferring,
    Done,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Error)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Waiting => "waiting",
            TaskStatus::Resolving => "resolving",
            TaskStatus::Downloading => "downloading",
            TaskStatus::Transferring => "transferring",
            TaskStatus::Done => "done",
            TaskStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub enum TaskEventKind {
    Status { status: TaskStatus, hint: String },
    Progress(Progress),
    Completed { path: PathBuf },
    Failed { error: String },
}

#[derive(Debug, Clone)]
pub struct TaskEvent {
    pub id: u64,
    pub name: String,
    pub kind: TaskEventKind,
}

pub type EventSender = UnboundedSender<TaskEvent>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Shared identity and status of one task across its resolve and download phases.
#[derive(Debug)]
pub struct TaskHandle {
    id: u64,
    name: String,
    state: Mutex<(TaskStatus, String)>,
    events: Option<EventSender>,
}

impl TaskHandle {
    pub fn new(name: impl Into<String>, events: Option<EventSender>) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            state: Mutex::new((TaskStatus::Waiting, "waiting".to_string())),
            events,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> TaskStatus {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).0
    }

    pub fn hint(&self) -> String {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).1.clone()
    }

    /// Record a transition. Status only moves forward: a lower status keeps
    /// the current one and only replaces the hint. Terminal states are final.
    pub fn set(&self, status: TaskStatus, hint: impl Into<String>) {
        let hint = hint.into();
        let status = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.0.is_terminal() {
                return;
            }
            let status = status.max(state.0);
            *state = (status, hint.clone());
            status
        };
        tracing::info!(task = self.id, name = %self.name, %status, "{}", hint);
        self.emit(TaskEventKind::Status { status, hint });
    }

    /// Replace the hint, keeping the current status.
    pub fn note(&self, hint: impl Into<String>) {
        self.set(TaskStatus::Waiting, hint);
    }

    pub fn progress(&self, progress: Progress) {
        self.emit(TaskEventKind::Progress(progress));
    }

    pub fn complete(&self, path: PathBuf) {
        self.set(TaskStatus::Done, format!("saved to {}", path.display()));
        self.emit(TaskEventKind::Completed { path });
    }

    pub fn fail(&self, error: String) {
        tracing::error!(task = self.id, name = %self.name, "task failed: {}", error);
        self.set(TaskStatus::Error, error.clone());
        self.emit(TaskEventKind::Failed { error });
    }

    fn emit(&self, kind: TaskEventKind) {
        if let Some(tx) = &self.events {
            let _ = tx.send(TaskEvent {
                id: self.id,
                name: self.name.clone(),
                kind,
            });
        }
    }
}
