//! Size and content-type probes, retried with a bounded fixed-delay policy.

use reqwest::header::{CONNECTION, CONTENT_TYPE};
use tokio_util::sync::CancellationToken;

use super::{FetchError, RequestTemplate};
use crate::retry::{run_with_retry, RetryError, RetryPolicy};

/// Content types that identify an HLS playlist.
pub const HLS_CONTENT_TYPES: [&str; 2] = ["application/vnd.apple.mpegurl", "application/x-mpegurl"];

/// True when `content_type` (parameters ignored, case-insensitive) is an HLS playlist type.
pub fn is_hls_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    HLS_CONTENT_TYPES.contains(&essence.as_str())
}

pub(crate) fn flatten<T>(res: Result<T, RetryError<FetchError>>) -> Result<T, FetchError> {
    res.map_err(|e| match e {
        RetryError::Exhausted { error, .. } => error,
        RetryError::Cancelled => FetchError::Cancelled,
    })
}

/// Learn the total size from the Content-Length of a plain GET (body not read).
/// A missing or zero length is fatal; transport errors are retried.
pub async fn probe_size(
    client: &reqwest::Client,
    tmpl: &RequestTemplate,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<u64, FetchError> {
    flatten(
        run_with_retry(policy, cancel, "size probe", |_| async move {
            let resp = tmpl.get(client)?.header(CONNECTION, "close").send().await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(FetchError::Http(status.as_u16()));
            }
            match resp.content_length() {
                Some(len) if len > 0 => Ok(len),
                _ => Err(FetchError::EmptySource),
            }
        })
        .await,
    )
}

/// Response content type of a GET (body not read); empty when the header is absent.
pub async fn probe_content_type(
    client: &reqwest::Client,
    tmpl: &RequestTemplate,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<String, FetchError> {
    flatten(
        run_with_retry(policy, cancel, "content-type probe", |_| async move {
            let resp = tmpl.get(client)?.header(CONNECTION, "close").send().await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(FetchError::Http(status.as_u16()));
            }
            Ok(resp
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string())
        })
        .await,
    )
}
