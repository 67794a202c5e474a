//! Tests for merge, checksum, completions, man.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use clap_complete::Shell;
use std::path::Path;

#[test]
fn cli_parse_merge() {
    match parse(&["vdl", "merge", "/dl/show.mp4_temp_ts_files", "/dl/show.mp4"]) {
        CliCommand::Merge { ts_dir, output } => {
            assert_eq!(ts_dir, Path::new("/dl/show.mp4_temp_ts_files"));
            assert_eq!(output, Path::new("/dl/show.mp4"));
        }
        _ => panic!("expected Merge"),
    }
}

#[test]
fn cli_parse_checksum() {
    match parse(&["vdl", "checksum", "/tmp/out.mp4"]) {
        CliCommand::Checksum { path, expect } => {
            assert_eq!(path, Path::new("/tmp/out.mp4"));
            assert!(expect.is_none());
        }
        _ => panic!("expected Checksum"),
    }
}

#[test]
fn cli_parse_completions() {
    match parse(&["vdl", "completions", "zsh"]) {
        CliCommand::Completions { shell } => assert_eq!(shell, Shell::Zsh),
        _ => panic!("expected Completions"),
    }
    assert!(Cli::try_parse_from(["vdl", "completions", "cmd.exe"]).is_err());
}

#[test]
fn cli_parse_man() {
    assert!(matches!(parse(&["vdl", "man"]), CliCommand::Man));
}

#[test]
fn cli_rejects_unknown_command() {
    assert!(Cli::try_parse_from(["vdl", "status"]).is_err());
}
