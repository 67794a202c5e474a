//! Process-wide bandwidth cap shared by every chunk of every active download.
//!
//! One `RateLimiter` is built per process and handed to each fetch as an
//! `Arc`. Callers ask for a grant before each buffered read, back off briefly
//! when refused, and report the bytes actually read afterwards.

mod bucket;
mod meter;

pub use bucket::{TokenBucket, MIN_GRANT};
pub use meter::{format_rate, ThroughputMeter};

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Back-off when the bucket refuses a grant.
pub const GRANT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Configured bandwidth cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimit {
    Unlimited,
    BytesPerSec(u64),
}

/// Shared token bucket plus throughput telemetry.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Option<Mutex<TokenBucket>>,
    meter: ThroughputMeter,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        let bucket = match limit {
            RateLimit::Unlimited => None,
            RateLimit::BytesPerSec(rate) => Some(Mutex::new(TokenBucket::new(rate))),
        };
        Self {
            bucket,
            meter: ThroughputMeter::default(),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(RateLimit::Unlimited)
    }

    /// Grant between 0 and `request` tokens. 0 means back off and ask again.
    pub fn try_consume(&self, request: u64) -> u64 {
        match &self.bucket {
            None => request,
            Some(bucket) => bucket
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .try_consume(request),
        }
    }

    /// Wait (polling) until a non-zero grant is available, or cancellation.
    pub async fn acquire(&self, request: u64, cancel: &CancellationToken) -> Option<u64> {
        loop {
            let granted = self.try_consume(request);
            if granted > 0 {
                return Some(granted);
            }
            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(GRANT_RETRY_DELAY) => {}
            }
        }
    }

    /// Record bytes actually transferred (may be less than granted).
    pub fn complete_consume(&self, bytes: u64) {
        self.meter.record(bytes);
    }

    /// Most recently published rate, e.g. "1.2 MB/s".
    pub fn current_rate(&self) -> String {
        self.meter.current()
    }

    /// Spawn the telemetry loop; it stops when `cancel` fires.
    pub fn spawn_meter(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.meter.run(interval, cancel).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_grants_everything() {
        let l = RateLimiter::unlimited();
        assert_eq!(l.try_consume(4096), 4096);
        assert_eq!(l.try_consume(0), 0);
    }

    #[tokio::test]
    async fn acquire_waits_for_refill() {
        let l = RateLimiter::new(RateLimit::BytesPerSec(64 * 1024));
        let cancel = CancellationToken::new();
        let started = std::time::Instant::now();
        let granted = l.acquire(4096, &cancel).await;
        assert!(granted.is_some_and(|g| g > 0 && g <= 4096));
        assert!(started.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn acquire_stops_on_cancel() {
        let l = RateLimiter::new(RateLimit::BytesPerSec(1));
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(l.acquire(4096, &cancel).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn meter_publishes_rate() {
        let l = Arc::new(RateLimiter::unlimited());
        let cancel = CancellationToken::new();
        let handle = l.spawn_meter(Duration::from_secs(1), cancel.clone());
        l.complete_consume(4 * 1024 * 1024);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(l.current_rate(), "4.0 MB/s");
    }
}
