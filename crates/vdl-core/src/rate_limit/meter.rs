//! Advisory throughput telemetry: bytes actually transferred per interval.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

const MIB: f64 = 1024.0 * 1024.0;

/// Accumulates completed bytes and renders the observed rate as "x.x MB/s".
#[derive(Debug)]
pub struct ThroughputMeter {
    consumed: AtomicU64,
    current: Mutex<String>,
}

impl Default for ThroughputMeter {
    fn default() -> Self {
        Self {
            consumed: AtomicU64::new(0),
            current: Mutex::new(format_rate(0, Duration::from_secs(1))),
        }
    }
}

impl ThroughputMeter {
    pub fn record(&self, bytes: u64) {
        self.consumed.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Publish the rate since the last sample and reset the counter.
    pub fn sample(&self, elapsed: Duration) -> String {
        let bytes = self.consumed.swap(0, Ordering::Relaxed);
        let rate = format_rate(bytes, elapsed);
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if *current != rate {
            tracing::trace!(rate = %rate, "throughput");
            current.clone_from(&rate);
        }
        rate
    }

    pub fn current(&self) -> String {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub(crate) async fn run(&self, interval: Duration, cancel: tokio_util::sync::CancellationToken) {
        let mut last = tokio::time::Instant::now();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            let now = tokio::time::Instant::now();
            self.sample(now.duration_since(last));
            last = now;
        }
    }
}

/// Render bytes over `elapsed` as MiB/s with one decimal.
pub fn format_rate(bytes: u64, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    let rate = if secs > 0.0 { bytes as f64 / MIB / secs } else { 0.0 };
    format!("{:.1} MB/s", rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_rate_mib() {
        assert_eq!(format_rate(0, Duration::from_secs(1)), "0.0 MB/s");
        assert_eq!(format_rate(3 * 1024 * 1024, Duration::from_secs(2)), "1.5 MB/s");
        assert_eq!(format_rate(1024, Duration::ZERO), "0.0 MB/s");
    }

    #[test]
    fn sample_resets_counter() {
        let m = ThroughputMeter::default();
        m.record(1024 * 1024);
        m.record(1024 * 1024);
        assert_eq!(m.sample(Duration::from_secs(1)), "2.0 MB/s");
        assert_eq!(m.current(), "2.0 MB/s");
        assert_eq!(m.sample(Duration::from_secs(1)), "0.0 MB/s");
    }
}
