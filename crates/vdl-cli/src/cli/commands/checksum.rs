//! Checksum command: print or verify the SHA-256 of a file.

use anyhow::{bail, Result};
use std::path::Path;
use vdl_core::checksum;

pub fn run_checksum(path: &Path, expect: Option<&str>) -> Result<()> {
    match expect {
        None => {
            let digest = checksum::sha256_path(path)?;
            println!("{}  {}", digest, path.display());
        }
        Some(expected) => {
            if !checksum::verify_path(path, expected)? {
                bail!("checksum mismatch for {}", path.display());
            }
            println!("{}: OK", path.display());
        }
    }
    Ok(())
}
