//! SHA-256 digests of finished outputs.
//!
//! Used by `vdl checksum` to compare a merged file against a reference copy.
//! Nothing on the download path hashes data.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Lowercase hex SHA-256 of a file, read in fixed-size blocks.
pub fn sha256_path(path: &Path) -> Result<String> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn sha256_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// True when the file's digest equals `expected` (hex, any case, surrounding whitespace ignored).
pub fn verify_path(path: &Path, expected: &str) -> Result<bool> {
    let actual = sha256_path(path)?;
    Ok(actual.eq_ignore_ascii_case(expected.trim()))
}
