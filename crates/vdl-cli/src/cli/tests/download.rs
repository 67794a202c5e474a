//! Tests for run and get.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use std::path::Path;
use vdl_core::config::{DownloadMode, VdlConfig};

#[test]
fn cli_parse_run() {
    match parse(&["vdl", "run", "tasks.txt"]) {
        CliCommand::Run { tasks_file, opts } => {
            assert_eq!(tasks_file, Path::new("tasks.txt"));
            assert!(opts.download_dir.is_none());
            assert!(opts.rate_limit.is_none());
            assert!(!opts.simple);
        }
        _ => panic!("expected Run"),
    }
}

#[test]
fn cli_parse_run_with_overrides() {
    match parse(&[
        "vdl",
        "run",
        "tasks.txt",
        "-o",
        "/media",
        "--rate-limit",
        "800kbps",
        "--simple",
    ]) {
        CliCommand::Run { opts, .. } => {
            let cfg = opts.apply(VdlConfig::default());
            assert_eq!(cfg.download_dir, Path::new("/media"));
            assert_eq!(cfg.rate_limit, "800kbps");
            assert_eq!(cfg.mode, DownloadMode::Simple);
        }
        _ => panic!("expected Run"),
    }
}

#[test]
fn cli_parse_get() {
    match parse(&["vdl", "get", "Ep 1", "https://site/v/1"]) {
        CliCommand::Get { name, url, opts } => {
            assert_eq!(name, "Ep 1");
            assert_eq!(url, "https://site/v/1");
            let cfg = opts.apply(VdlConfig::default());
            assert_eq!(cfg.mode, DownloadMode::MultiThread);
        }
        _ => panic!("expected Get"),
    }
}

#[test]
fn cli_parse_global_config() {
    let cli = Cli::try_parse_from(["vdl", "get", "a", "https://b", "--config", "/etc/vdl.toml"]).unwrap();
    assert_eq!(cli.config.as_deref(), Some(Path::new("/etc/vdl.toml")));
}

#[test]
fn cli_get_requires_url() {
    assert!(Cli::try_parse_from(["vdl", "get", "only-name"]).is_err());
}
