//! Creates and preallocates a fresh temp file for an item.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;

use super::writer::StorageWriter;
#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Builder for a new temp file. Call `preallocate` then `build`.
pub struct StorageWriterBuilder {
    file: File,
}

impl StorageWriterBuilder {
    /// Create (or truncate) the temp file at `path`, creating parent directories.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create directory {}", parent.display()))?;
            }
        }
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("failed to create temp file: {}", path.display()))?;
        Ok(StorageWriterBuilder { file })
    }

    /// Reserve `size` bytes. Uses `posix_fallocate` on Unix, `set_len` otherwise
    /// or when the filesystem refuses.
    pub fn preallocate(&mut self, size: u64) -> Result<()> {
        #[cfg(unix)]
        {
            let fd = self.file.as_raw_fd();
            let r = unsafe { libc::posix_fallocate(fd, 0, size as libc::off_t) };
            if r == 0 {
                return Ok(());
            }
            tracing::debug!(errno = r, "posix_fallocate failed, falling back to set_len");
        }
        self.file
            .set_len(size)
            .context("failed to preallocate file")?;
        Ok(())
    }

    pub fn build(self) -> StorageWriter {
        StorageWriter::from_file(self.file)
    }
}
