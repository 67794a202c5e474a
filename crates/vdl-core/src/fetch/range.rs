//! One chunk or segment fetch written positionally into the destination.

use reqwest::header::{HeaderMap, CONTENT_RANGE, RANGE};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;
use futures::TryStreamExt;
use tokio_util::sync::CancellationToken;

use super::{FetchError, RequestTemplate};
use crate::rate_limit::RateLimiter;
use crate::segmenter::UnitTask;
use crate::storage::PositionalWriter;

/// Largest grant requested per read.
pub const READ_BUF_SIZE: usize = 4 * 1024;
/// A single read that stalls this long fails the fetch (retryable).
pub const READ_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Start offset from `Content-Range: bytes <start>-<end>/<total>`.
pub fn content_range_start(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(CONTENT_RANGE)?.to_str().ok()?;
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (start, _) = rest.split_once('-')?;
    start.trim().parse().ok()
}

/// Shared collaborators of every fetch.
#[derive(Clone)]
pub struct FetchContext {
    pub client: reqwest::Client,
    pub limiter: std::sync::Arc<RateLimiter>,
    pub cancel: CancellationToken,
}

impl FetchContext {
    /// GET `tmpl` (with `Range` when `range` is set) and write the body into `writer`.
    ///
    /// Bytes land at `range.from + written`, or at the server's `Content-Range`
    /// start when it names a different one. Each read is preceded by a grant
    /// from the shared limiter. Returns the number of bytes written.
    pub async fn fetch_into(
        &self,
        tmpl: &RequestTemplate,
        range: Option<UnitTask>,
        writer: &PositionalWriter,
    ) -> Result<u64, FetchError> {
        if self.cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        let mut req = tmpl.get(&self.client)?;
        if let Some(r) = range {
            req = req.header(RANGE, r.range_header_value());
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Http(status.as_u16()));
        }

        let requested_from = range.map(|r| r.from).unwrap_or(0);
        let base = match content_range_start(resp.headers()) {
            Some(start) => {
                if start != requested_from {
                    tracing::warn!(requested_from, start, url = %tmpl.url, "server renumbered range start");
                }
                start
            }
            None if requested_from != 0 && status == reqwest::StatusCode::OK => {
                return Err(FetchError::RangeIgnored(requested_from));
            }
            None => requested_from,
        };
        let expected = resp.content_length().or(range.map(|r| r.len()));

        let stream = resp.bytes_stream().map_err(std::io::Error::other);
        let reader = StreamReader::new(stream);
        tokio::pin!(reader);
        let mut buf = vec![0u8; READ_BUF_SIZE];
        let mut written = 0u64;
        loop {
            let granted = self
                .limiter
                .acquire(READ_BUF_SIZE as u64, &self.cancel)
                .await
                .ok_or(FetchError::Cancelled)?;
            let want = (granted as usize).min(READ_BUF_SIZE);
            let n = match tokio::time::timeout(READ_IDLE_TIMEOUT, reader.read(&mut buf[..want])).await {
                Ok(res) => res.map_err(FetchError::Body)?,
                Err(_) => {
                    return Err(FetchError::Body(std::io::Error::from(
                        std::io::ErrorKind::TimedOut,
                    )))
                }
            };
            if n == 0 {
                break;
            }
            writer
                .write_at(base + written, &buf[..n])
                .map_err(FetchError::Storage)?;
            written += n as u64;
            self.limiter.complete_consume(n as u64);
        }

        if let Some(expected) = expected {
            if written != expected {
                return Err(FetchError::PartialTransfer {
                    expected,
                    received: written,
                });
            }
        }
        Ok(written)
    }

    /// Plain GET of `tmpl` into a freshly created file at `path`.
    pub async fn fetch_to_file(&self, tmpl: &RequestTemplate, path: &Path) -> Result<u64, FetchError> {
        let writer = PositionalWriter::create(path)
            .map_err(|e| FetchError::Storage(std::io::Error::other(format!("{:#}", e))))?;
        self.fetch_into(tmpl, None, &writer).await
    }
}
