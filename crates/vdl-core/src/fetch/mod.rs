//! HTTP fetches: probes, byte-range chunks, and whole playlist segments.
//!
//! Every fetch draws from the shared `RateLimiter` before each bounded read
//! and writes through a `PositionalWriter`, so many chunks can share one file.

mod error;
mod probe;
mod range;
mod request;

pub use error::FetchError;
pub use probe::{is_hls_content_type, probe_content_type, probe_size, HLS_CONTENT_TYPES};
pub(crate) use probe::flatten as flatten_retry;
pub use range::{content_range_start, FetchContext, READ_BUF_SIZE, READ_IDLE_TIMEOUT};
pub use request::{build_client, with_default_headers, RequestTemplate, CONNECT_TIMEOUT};
