//! CLI for the VDL segmented media downloader.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use vdl_core::config::{self, DownloadMode, VdlConfig};

use commands::{run_checksum, run_completions, run_get, run_man, run_merge, run_tasks_file};

/// Top-level CLI for the VDL media downloader.
#[derive(Debug, Parser)]
#[command(name = "vdl")]
#[command(about = "VDL: segmented MP4/HLS downloader with a shared bandwidth cap", long_about = None)]
pub struct Cli {
    /// Use this config file instead of the XDG default.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// Overrides applied on top of the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct DownloadOptions {
    /// Directory for finished files.
    #[arg(long, short = 'o', value_name = "DIR")]
    pub download_dir: Option<PathBuf>,
    /// Bandwidth cap, e.g. 800kbps, 5mbps, unlimited.
    #[arg(long, value_name = "RATE")]
    pub rate_limit: Option<String>,
    /// Fetch chunks one at a time instead of through the chunk pool.
    #[arg(long)]
    pub simple: bool,
}

impl DownloadOptions {
    pub fn apply(&self, mut cfg: VdlConfig) -> VdlConfig {
        if let Some(dir) = &self.download_dir {
            cfg.download_dir = dir.clone();
        }
        if let Some(rate) = &self.rate_limit {
            cfg.rate_limit = rate.clone();
        }
        if self.simple {
            cfg.mode = DownloadMode::Simple;
        }
        cfg
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download every `name|url` line of a tasks file.
    Run {
        /// Path to the tasks file.
        tasks_file: PathBuf,
        #[command(flatten)]
        opts: DownloadOptions,
    },

    /// Download a single media URL as `<name>.mp4`.
    Get {
        /// Output name (without extension).
        name: String,
        /// Page or media URL.
        url: String,
        #[command(flatten)]
        opts: DownloadOptions,
    },

    /// Merge the segments left in a segment directory by an interrupted job.
    Merge {
        /// Directory holding `ts_<n>.ts` files.
        ts_dir: PathBuf,
        /// Output file.
        output: PathBuf,
    },

    /// Compute SHA-256 of a file, optionally checking it against a known digest.
    Checksum {
        /// Path to the file.
        path: PathBuf,
        /// Expected hex digest; a mismatch exits with an error.
        #[arg(long)]
        expect: Option<String>,
    },

    /// Print shell completions.
    Completions {
        shell: Shell,
    },

    /// Print the man page.
    Man,
}

fn load_config(path: Option<&PathBuf>) -> Result<VdlConfig> {
    let cfg = match path {
        Some(p) => config::load_from_path(p)?,
        None => config::load_or_init()?,
    };
    Ok(cfg.normalized())
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let config_path = cli.config.as_ref();

        match cli.command {
            CliCommand::Run { tasks_file, opts } => {
                let cfg = opts.apply(load_config(config_path)?);
                tracing::debug!("loaded config: {:?}", cfg);
                run_tasks_file(cfg, &tasks_file).await?;
            }
            CliCommand::Get { name, url, opts } => {
                let cfg = opts.apply(load_config(config_path)?);
                run_get(cfg, name, url).await?;
            }
            CliCommand::Merge { ts_dir, output } => {
                let cfg = load_config(config_path)?;
                run_merge(&cfg, &ts_dir, &output).await?;
            }
            CliCommand::Checksum { path, expect } => run_checksum(&path, expect.as_deref())?,
            CliCommand::Completions { shell } => run_completions(shell),
            CliCommand::Man => run_man()?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
