//! CLI command handlers, one file per command.

mod checksum;
mod completions;
mod get;
mod man;
mod merge;
mod run;

pub use checksum::run_checksum;
pub use completions::run_completions;
pub use get::run_get;
pub use man::run_man;
pub use merge::run_merge;
pub use run::run_tasks_file;
