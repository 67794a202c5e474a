//! Error type for a single HTTP fetch (probe, range, or segment).

use crate::retry::{classify_http_status, classify_io_error, classify_reqwest_error, Classify, ErrorKind};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Request could not be sent or the connection failed.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u16),
    /// Reading the body failed mid-stream.
    #[error("body read failed: {0}")]
    Body(std::io::Error),
    /// Body ended before the advertised length.
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    PartialTransfer { expected: u64, received: u64 },
    /// Server ignored the Range header for a chunk that does not start at 0.
    #[error("server ignored range request starting at {0}")]
    RangeIgnored(u64),
    /// Source reported no content.
    #[error("source is empty (no Content-Length)")]
    EmptySource,
    /// Writing to the destination failed (disk full, permission denied).
    #[error("storage: {0}")]
    Storage(std::io::Error),
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("cancelled")]
    Cancelled,
}

impl Classify for FetchError {
    fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Transport(e) => classify_reqwest_error(e),
            FetchError::Http(code) => classify_http_status(*code),
            FetchError::Body(e) => match classify_io_error(e) {
                // Body errors come from the network side of the stream.
                ErrorKind::Fatal => ErrorKind::Connection,
                kind => kind,
            },
            FetchError::PartialTransfer { .. } => ErrorKind::Connection,
            FetchError::RangeIgnored(_)
            | FetchError::EmptySource
            | FetchError::Storage(_)
            | FetchError::InvalidUrl { .. }
            | FetchError::Cancelled => ErrorKind::Fatal,
        }
    }
}
