//! Randomized range splitting.
//!
//! The file is cut into `count` roughly equal partitions; each partition is
//! carved into chunks of `base + random(0, base)` bytes while more than
//! `2 * base` remain, and the remainder becomes the partition's last chunk.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::range::UnitTask;

/// Default number of partitions.
pub const DEFAULT_SPLIT_COUNT: usize = 64;
/// Default base chunk size (2 MiB).
pub const DEFAULT_BASE_CHUNK: u64 = 2 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitParams {
    pub count: usize,
    pub base_chunk: u64,
}

impl Default for SplitParams {
    fn default() -> Self {
        Self {
            count: DEFAULT_SPLIT_COUNT,
            base_chunk: DEFAULT_BASE_CHUNK,
        }
    }
}

impl From<&crate::config::SplitConfig> for SplitParams {
    fn from(cfg: &crate::config::SplitConfig) -> Self {
        Self {
            count: cfg.count,
            base_chunk: cfg.base_chunk_bytes,
        }
    }
}

/// Split `[0, total)` into ordered, disjoint ranges. Freshly seeded on every call.
pub fn split_ranges(total: u64, params: SplitParams) -> Vec<UnitTask> {
    let mut rng = StdRng::from_entropy();
    split_ranges_with(total, params, &mut rng)
}

/// Like `split_ranges` with a caller-supplied RNG.
pub fn split_ranges_with<R: Rng>(total: u64, params: SplitParams, rng: &mut R) -> Vec<UnitTask> {
    if total == 0 {
        return Vec::new();
    }
    let count = params.count.max(1) as u64;
    let base = params.base_chunk.max(1);
    let partition = total.div_ceil(count);

    let mut out = Vec::new();
    for i in 0..count {
        let start = i * partition;
        if start >= total {
            break;
        }
        let end = (start + partition).min(total);
        let mut cur = start;
        while end - cur > base.saturating_mul(2) {
            let step = base.saturating_add(rng.gen_range(0..base));
            out.push(UnitTask::new(cur, cur + step));
            cur += step;
        }
        out.push(UnitTask::new(cur, end));
    }
    out
}
