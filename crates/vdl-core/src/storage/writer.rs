//! Shared destination file written at explicit offsets from many tasks.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
#[cfg(unix)]
use std::os::unix::fs::FileExt;
#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Destination file handle. Cheap to clone; every clone shares one descriptor and
/// writes with `pwrite`, so concurrent writers never touch a shared cursor.
#[derive(Debug, Clone)]
pub struct PositionalWriter {
    file: Arc<File>,
    path: PathBuf,
}

impl PositionalWriter {
    /// Create (or truncate) `path`.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        Ok(Self {
            file: Arc::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Create `path` and reserve `size` bytes up front.
    pub fn create_sized(path: &Path, size: u64) -> Result<Self> {
        let writer = Self::create(path)?;
        writer.preallocate(size)?;
        Ok(writer)
    }

    /// On Unix tries `posix_fallocate` for real block allocation, else `set_len`.
    fn preallocate(&self, size: u64) -> Result<()> {
        if size == 0 {
            return Ok(());
        }
        #[cfg(unix)]
        {
            let fd = self.file.as_raw_fd();
            // SAFETY: fd is owned by self.file and stays open for the call.
            let r = unsafe { libc::posix_fallocate(fd, 0, size as libc::off_t) };
            if r == 0 {
                return Ok(());
            }
            tracing::debug!(errno = r, "posix_fallocate failed, falling back to set_len");
        }
        self.file
            .set_len(size)
            .with_context(|| format!("failed to preallocate {}", self.path.display()))
    }

    /// Write all of `data` at `offset`.
    #[cfg(unix)]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> std::io::Result<()> {
        self.file.write_all_at(data, offset)
    }

    #[cfg(not(unix))]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> std::io::Result<()> {
        use std::io::{Seek, SeekFrom, Write};
        let mut f = (*self.file).try_clone()?;
        f.seek(SeekFrom::Start(offset))?;
        f.write_all(data)
    }

    pub fn sync(&self) -> Result<()> {
        self.file
            .sync_all()
            .with_context(|| format!("sync {}", self.path.display()))
    }

    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
