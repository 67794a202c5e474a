//! Retry policy shared by probes, chunk fetches, and playlist loads.
//!
//! Errors are classified into an `ErrorKind`; the policy retries every kind
//! except `Fatal` with a fixed delay until the attempt budget runs out.

mod classify;
mod policy;
mod run;

pub use classify::{classify_http_status, classify_io_error, classify_reqwest_error, Classify};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::{run_with_retry, RetryError};
