//! Token bucket: one token per byte, burst capacity of one second's worth.

use std::time::Instant;

/// Grants below this many tokens are refused so callers back off instead of issuing tiny reads.
pub const MIN_GRANT: u64 = 1024;

/// Token bucket state. Not synchronized; `RateLimiter` wraps it in a mutex.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u64,
    tokens: u64,
    refill_per_sec: u64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Empty bucket refilling at `bytes_per_sec`, capacity equal to the rate.
    pub fn new(bytes_per_sec: u64) -> Self {
        Self::starting_at(bytes_per_sec, Instant::now())
    }

    pub fn starting_at(bytes_per_sec: u64, now: Instant) -> Self {
        let rate = bytes_per_sec.max(1);
        Self {
            capacity: rate,
            tokens: 0,
            refill_per_sec: rate,
            last_refill: now,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let added = elapsed.as_nanos() * self.refill_per_sec as u128 / 1_000_000_000;
        if added == 0 {
            // Keep the partial interval so slow rates still accumulate.
            return;
        }
        let added = u64::try_from(added).unwrap_or(u64::MAX);
        self.tokens = self.tokens.saturating_add(added).min(self.capacity);
        self.last_refill = now;
    }

    /// Refill, then grant `min(tokens, request)`, or 0 when fewer than the minimum grant remain.
    pub fn try_consume_at(&mut self, request: u64, now: Instant) -> u64 {
        self.refill(now);
        if self.tokens < MIN_GRANT.min(self.capacity) {
            return 0;
        }
        let granted = self.tokens.min(request);
        self.tokens -= granted;
        granted
    }

    pub fn try_consume(&mut self, request: u64) -> u64 {
        self.try_consume_at(request, Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::time::Duration;

    #[test]
    fn starts_empty() {
        let t0 = Instant::now();
        let mut b = TokenBucket::starting_at(4096, t0);
        assert_eq!(b.try_consume_at(4096, t0), 0);
        assert_eq!(b.capacity(), 4096);
    }

    #[test]
    fn refills_proportionally_and_caps() {
        let t0 = Instant::now();
        let mut b = TokenBucket::starting_at(10_000, t0);
        assert_eq!(b.try_consume_at(100_000, t0 + Duration::from_millis(500)), 5_000);
        assert_eq!(b.tokens(), 0);
        // Ten seconds idle only fills one second of burst.
        assert_eq!(b.try_consume_at(100_000, t0 + Duration::from_millis(10_500)), 10_000);
    }

    #[test]
    fn below_min_grant_is_refused() {
        let t0 = Instant::now();
        let mut b = TokenBucket::starting_at(10_000, t0);
        // 50ms at 10k/s = 500 tokens, under the floor.
        assert_eq!(b.try_consume_at(4096, t0 + Duration::from_millis(50)), 0);
        assert_eq!(b.tokens(), 500);
        assert_eq!(b.try_consume_at(4096, t0 + Duration::from_millis(150)), 1500);
    }

    #[test]
    fn floor_never_exceeds_capacity() {
        let t0 = Instant::now();
        let mut b = TokenBucket::starting_at(512, t0);
        assert_eq!(b.try_consume_at(4096, t0 + Duration::from_secs(2)), 512);
    }

    #[test]
    fn grants_stay_within_bounds() {
        let mut rng = rand::thread_rng();
        let t0 = Instant::now();
        let mut b = TokenBucket::starting_at(64 * 1024, t0);
        let mut now = t0;
        for _ in 0..10_000 {
            now += Duration::from_micros(rng.gen_range(0..50_000));
            let request = rng.gen_range(0..20_000u64);
            let before = {
                let mut probe = TokenBucket {
                    capacity: b.capacity,
                    tokens: b.tokens,
                    refill_per_sec: b.refill_per_sec,
                    last_refill: b.last_refill,
                };
                probe.refill(now);
                probe.tokens
            };
            let granted = b.try_consume_at(request, now);
            assert!(granted <= request);
            assert!(granted <= before);
            assert!(b.tokens() <= b.capacity());
        }
    }
}
