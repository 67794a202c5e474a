//! Async retry loop: run an operation until success or the policy says stop.

use std::future::Future;
use tokio_util::sync::CancellationToken;

use super::classify::Classify;
use super::policy::{RetryDecision, RetryPolicy};

/// Outcome of `run_with_retry` when it gives up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Last error after the policy stopped retrying, with the attempts made.
    Exhausted { error: E, attempts: u32 },
    /// Cancellation fired between attempts.
    Cancelled,
}

/// Run `op` until it succeeds, the error is fatal, attempts run out, or `cancel` fires.
/// Sleeps the policy delay between attempts; `label` tags the retry log lines.
pub async fn run_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    label: &str,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: Classify + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1u32;
    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) => match policy.decide(attempt, e.kind()) {
                RetryDecision::NoRetry => {
                    return Err(RetryError::Exhausted {
                        error: e,
                        attempts: attempt,
                    })
                }
                RetryDecision::RetryAfter(d) => {
                    tracing::debug!(attempt, label, "retrying after error: {}", e);
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                        _ = tokio::time::sleep(d) => {}
                    }
                    attempt += 1;
                }
            },
        }
    }
}
