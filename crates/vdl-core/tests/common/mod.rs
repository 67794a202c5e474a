#![allow(dead_code)]

pub mod range_server;

use std::sync::Arc;
use std::time::Duration;
use vdl_core::config::{DownloadMode, MergeToolKind, VdlConfig};
use vdl_core::control::Shutdown;
use vdl_core::engine::EngineContext;
use vdl_core::fetch::{build_client, FetchContext};
use vdl_core::pool::WorkerPool;
use vdl_core::rate_limit::{RateLimit, RateLimiter};

/// Config tuned for tests: native merge, short retry delays.
pub fn test_config(dir: &std::path::Path) -> VdlConfig {
    let mut cfg = VdlConfig::default();
    cfg.download_dir = dir.to_path_buf();
    cfg.rate_limit = "unlimited".to_string();
    cfg.mode = DownloadMode::MultiThread;
    cfg.retry.max_attempts = 3;
    cfg.retry.delay_secs = 0.05;
    cfg.merge.tool = MergeToolKind::Native;
    cfg.merge.fragment_retry_delay_secs = 0.01;
    cfg.pacing.initial_secs = 0.01;
    cfg.pacing.max_secs = 0.05;
    cfg
}

pub fn engine_context(cfg: &VdlConfig, limit: RateLimit, shutdown: &Shutdown) -> EngineContext {
    let fetch = FetchContext {
        client: build_client().unwrap(),
        limiter: Arc::new(RateLimiter::new(limit)),
        cancel: shutdown.token().clone(),
    };
    let pool = WorkerPool::new("chunk", cfg.chunk_pool_size, Duration::from_secs(60), shutdown);
    EngineContext::new(cfg, fetch, pool)
}

/// Deterministic pseudo-random body.
pub fn body(len: usize) -> Vec<u8> {
    let mut x: u32 = 0x9e37_79b9;
    (0..len)
        .map(|_| {
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            x as u8
        })
        .collect()
}
