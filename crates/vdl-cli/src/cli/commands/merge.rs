//! `vdl merge`: finish an interrupted HLS job from its segment directory.

use anyhow::{Context, Result};
use std::path::Path;
use vdl_core::config::VdlConfig;
use vdl_core::merge::{collect_segments, Transfer};

pub async fn run_merge(cfg: &VdlConfig, ts_dir: &Path, output: &Path) -> Result<()> {
    let count = collect_segments(ts_dir)
        .with_context(|| format!("read {}", ts_dir.display()))?
        .len();
    println!("merging {} segment(s) from {}", count, ts_dir.display());
    Transfer::from_config(&cfg.merge)
        .merge_dir(ts_dir, output)
        .await
        .with_context(|| format!("merge into {}", output.display()))?;
    println!("saved {}", output.display());
    Ok(())
}
