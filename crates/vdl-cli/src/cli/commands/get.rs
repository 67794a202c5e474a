//! `vdl get`: one task given on the command line.

use anyhow::Result;
use vdl_core::config::VdlConfig;

use super::run::run_tasks;

pub async fn run_get(cfg: VdlConfig, name: String, url: String) -> Result<()> {
    run_tasks(cfg, vec![(name, url)]).await
}
