//! Byte range type used for chunked downloads.

/// A byte range `[from, to)` (half-open) of the destination file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitTask {
    /// Start offset (inclusive).
    pub from: u64,
    /// End offset (exclusive).
    pub to: u64,
}

impl UnitTask {
    pub fn new(from: u64, to: u64) -> Self {
        Self { from, to }
    }

    /// Length of this range in bytes.
    pub fn len(&self) -> u64 {
        self.to.saturating_sub(self.from)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// HTTP Range header value (inclusive end): `bytes=from-(to-1)`.
    pub fn range_header_value(&self) -> String {
        if self.is_empty() {
            format!("bytes={}-{}", self.from, self.from)
        } else {
            format!("bytes={}-{}", self.from, self.to - 1)
        }
    }
}
