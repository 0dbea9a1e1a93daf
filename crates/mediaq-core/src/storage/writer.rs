//! Positioned writer shared by all parts of one item.

use anyhow::{Context, Result};
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;
#[cfg(not(unix))]
use std::sync::Mutex;
#[cfg(unix)]
use std::os::unix::fs::FileExt;

/// Writer for an item's temp file. Clone one per part; each `write_at` is an
/// independent positioned write, so parts never serialize around network reads.
#[derive(Clone)]
pub struct StorageWriter {
    file: Arc<File>,
    /// Guards the seek+write pair where positioned writes are unavailable.
    #[cfg(not(unix))]
    seek_lock: Arc<Mutex<()>>,
}

impl StorageWriter {
    pub(crate) fn from_file(file: File) -> Self {
        Self {
            file: Arc::new(file),
            #[cfg(not(unix))]
            seek_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Open an existing temp file to resume into it (no truncation).
    pub fn open_existing(path: &Path) -> Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("failed to open existing temp file: {}", path.display()))?;
        Ok(Self::from_file(file))
    }

    /// Write all of `data` at absolute `offset`.
    #[cfg(unix)]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        self.file.write_all_at(data, offset)
    }

    #[cfg(not(unix))]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        use std::io::{Seek, SeekFrom, Write};
        let _guard = self
            .seek_lock
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "storage lock poisoned"))?;
        let mut f = &*self.file;
        f.seek(SeekFrom::Start(offset))?;
        f.write_all(data)
    }

    pub fn sync(&self) -> Result<()> {
        self.file.sync_all().context("storage sync failed")?;
        Ok(())
    }
}
