use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::rate_limit::RateLimit;

/// Smallest accepted `kbps` limit.
pub const RATE_LIMIT_MIN_KBPS: f64 = 10.0;
/// Largest accepted `kbps` limit (keeps the byte rate inside an i32 with headroom).
pub const RATE_LIMIT_MAX_KBPS: f64 = i32::MAX as f64 / 2.0 / 1024.0;
/// Smallest accepted `mbps` limit.
pub const RATE_LIMIT_MIN_MBPS: f64 = 0.1;
/// Largest accepted `mbps` limit.
pub const RATE_LIMIT_MAX_MBPS: f64 = RATE_LIMIT_MAX_KBPS / 1024.0;

/// Default rate limit when the configured value is missing or unrecognized.
pub const DEFAULT_RATE_LIMIT: &str = "5mbps";

/// Engine mode: chunks/segments one at a time on the job task, or fanned out to the chunk pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DownloadMode {
    #[serde(rename = "simple")]
    Simple,
    #[default]
    #[serde(rename = "multi-thread")]
    MultiThread,
}

/// Which external tool concatenates/muxes downloaded parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeToolKind {
    #[default]
    Ffmpeg,
    /// Plain byte concatenation (valid for MPEG-TS). Cannot mux separate streams.
    Native,
}

/// Range splitter parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Number of roughly equal partitions the file is cut into.
    pub count: usize,
    /// Base chunk size in bytes; each carved chunk is `base + random(0, base)`.
    pub base_chunk_bytes: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            count: 64,
            base_chunk_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Resolver collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Attempts per source reference (including the first).
    pub max_retries: u32,
    /// Delay between resolver attempts, in seconds.
    pub retry_delay_secs: u64,
    /// External resolver program and leading args; the source URL is appended.
    /// When absent the source URL is used as the download link directly.
    #[serde(default)]
    pub command: Option<Vec<String>>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay_secs: 2,
            command: None,
        }
    }
}

/// Per-call-site retry parameters for probes and chunk fetches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Fixed delay between attempts, in seconds.
    pub delay_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay_secs: 2.0,
        }
    }
}

/// Resolve-loop pacing (see `task::GrowableTicker`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    pub initial_secs: f64,
    pub max_secs: f64,
    pub growth_rate: f64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            initial_secs: 10.0,
            max_secs: 300.0,
            growth_rate: 0.2,
        }
    }
}

/// Merge/transfer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    pub tool: MergeToolKind,
    /// ffmpeg binary (looked up on PATH when not absolute).
    pub ffmpeg_path: String,
    /// Segments concatenated per tool invocation.
    pub batch_size: usize,
    /// Attempts for a fragmented segment's head+body download and merge.
    pub fragment_retries: u32,
    pub fragment_retry_delay_secs: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            tool: MergeToolKind::Ffmpeg,
            ffmpeg_path: "ffmpeg".to_string(),
            batch_size: 50,
            fragment_retries: 5,
            fragment_retry_delay_secs: 2.0,
        }
    }
}

/// Global configuration loaded from `~/.config/vdl/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VdlConfig {
    /// Directory final media files are written to.
    pub download_dir: PathBuf,
    /// Concurrently active whole-media downloads.
    pub job_pool_size: usize,
    /// Concurrently active chunk/segment fetches across all jobs.
    pub chunk_pool_size: usize,
    /// Idle pool workers exit after this many seconds.
    pub pool_idle_timeout_secs: u64,
    /// Global bandwidth cap: "5mbps", "512kbps", or "-1"/"unlimited".
    pub rate_limit: String,
    #[serde(default)]
    pub mode: DownloadMode,
    /// Suffix of the per-job segment directory (`<final>_<suffix>`).
    pub ts_dir_suffix: String,
    /// Download-queue requeues before a task is abandoned.
    pub max_download_attempts: u32,
    #[serde(default)]
    pub split: SplitConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub merge: MergeConfig,
}

impl Default for VdlConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("."),
            job_pool_size: 2,
            chunk_pool_size: 32,
            pool_idle_timeout_secs: 600,
            rate_limit: DEFAULT_RATE_LIMIT.to_string(),
            mode: DownloadMode::MultiThread,
            ts_dir_suffix: "temp_ts_files".to_string(),
            max_download_attempts: 5,
            split: SplitConfig::default(),
            resolver: ResolverConfig::default(),
            retry: RetryConfig::default(),
            pacing: PacingConfig::default(),
            merge: MergeConfig::default(),
        }
    }
}

impl VdlConfig {
    /// Parsed bandwidth cap. Unrecognized units fall back to the default with a warning.
    pub fn rate_limit(&self) -> Result<RateLimit> {
        parse_rate_limit(&self.rate_limit)
    }

    pub fn pool_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_idle_timeout_secs)
    }

    /// Replace non-positive sizes and blank strings with their defaults.
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();
        if self.job_pool_size == 0 {
            tracing::warn!("job_pool_size must be positive, using {}", defaults.job_pool_size);
            self.job_pool_size = defaults.job_pool_size;
        }
        if self.chunk_pool_size == 0 {
            tracing::warn!("chunk_pool_size must be positive, using {}", defaults.chunk_pool_size);
            self.chunk_pool_size = defaults.chunk_pool_size;
        }
        if self.ts_dir_suffix.trim().is_empty() {
            self.ts_dir_suffix = defaults.ts_dir_suffix;
        }
        if self.split.count == 0 || self.split.base_chunk_bytes == 0 {
            self.split = defaults.split;
        }
        if self.merge.batch_size == 0 {
            self.merge.batch_size = defaults.merge.batch_size;
        }
        self
    }
}

/// Parse a rate limit string into bytes per second.
///
/// `kbps`/`mbps` mean KiB/s and MiB/s. `-1` and `unlimited` disable the cap.
pub fn parse_rate_limit(raw: &str) -> Result<RateLimit> {
    let value = raw.trim().to_ascii_lowercase();
    if value.is_empty() {
        return parse_rate_limit(DEFAULT_RATE_LIMIT);
    }
    if value == "-1" || value == "unlimited" {
        return Ok(RateLimit::Unlimited);
    }
    if let Some(num) = value.strip_suffix("kbps") {
        let kbps = parse_bounded(num, RATE_LIMIT_MIN_KBPS, RATE_LIMIT_MAX_KBPS, "kbps")?;
        return Ok(RateLimit::BytesPerSec((kbps * 1024.0) as u64));
    }
    if let Some(num) = value.strip_suffix("mbps") {
        let mbps = parse_bounded(num, RATE_LIMIT_MIN_MBPS, RATE_LIMIT_MAX_MBPS, "mbps")?;
        return Ok(RateLimit::BytesPerSec((mbps * 1024.0 * 1024.0) as u64));
    }
    tracing::warn!(rate_limit = raw, "unrecognized rate limit, using {}", DEFAULT_RATE_LIMIT);
    parse_rate_limit(DEFAULT_RATE_LIMIT)
}

fn parse_bounded(num: &str, min: f64, max: f64, unit: &str) -> Result<f64> {
    let v: f64 = num
        .trim()
        .parse()
        .with_context(|| format!("invalid rate limit value: {:?}", num))?;
    if !(min..=max).contains(&v) {
        anyhow::bail!("rate limit out of range ({}): [{:.1}, {:.1}]", unit, min, max);
    }
    Ok(v)
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("vdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from an explicit path.
pub fn load_from_path(path: &Path) -> Result<VdlConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let cfg: VdlConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg.normalized())
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<VdlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = VdlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}
