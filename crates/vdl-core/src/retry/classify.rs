//! Classify HTTP statuses and transport errors into retry kinds.

use crate::retry::policy::ErrorKind;

/// Errors that know their own retry classification.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

/// Classify a non-2xx HTTP status. 416 means the range no longer exists upstream.
pub fn classify_http_status(code: u16) -> ErrorKind {
    match code {
        416 => ErrorKind::Fatal,
        429 | 503 => ErrorKind::Throttled,
        _ => ErrorKind::HttpStatus(code),
    }
}

/// Classify a transport-level reqwest error.
pub fn classify_reqwest_error(e: &reqwest::Error) -> ErrorKind {
    if e.is_timeout() {
        return ErrorKind::Timeout;
    }
    if e.is_builder() {
        return ErrorKind::Fatal;
    }
    if let Some(status) = e.status() {
        return classify_http_status(status.as_u16());
    }
    ErrorKind::Connection
}

/// Classify a local IO error seen while streaming a body.
pub fn classify_io_error(e: &std::io::Error) -> ErrorKind {
    use std::io::ErrorKind as Io;
    match e.kind() {
        Io::TimedOut => ErrorKind::Timeout,
        Io::ConnectionReset
        | Io::ConnectionAborted
        | Io::BrokenPipe
        | Io::UnexpectedEof
        | Io::Interrupted
        | Io::Other => ErrorKind::Connection,
        _ => ErrorKind::Fatal,
    }
}
