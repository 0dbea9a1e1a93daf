//! Disk I/O and file lifecycle for item downloads.
//!
//! Bytes land in `<target>.download`, preallocated to the item size and written
//! concurrently by the item's parts at absolute offsets. On completion the temp
//! file is renamed to the target, creating parent directories and never
//! overwriting an existing file (`name(1).ext`, `name(2).ext`, ...).

mod builder;
mod writer;

pub use builder::StorageWriterBuilder;
pub use writer::StorageWriter;

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Temporary file suffix used until the item is complete.
pub const TEMP_SUFFIX: &str = ".download";

/// Path for the temp file: appends `.download` to the target path.
pub fn temp_path(target: &Path) -> PathBuf {
    let mut o = target.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// `dir/stem(n).ext` for `dir/stem.ext` (or `dir/stem(n)` without extension).
fn numbered(target: &Path, n: u32) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| OsString::from("download"));
    let mut name = stem;
    name.push(format!("({})", n));
    if let Some(ext) = target.extension() {
        name.push(".");
        name.push(ext);
    }
    target.with_file_name(name)
}

fn occupied(target: &Path) -> bool {
    target.exists() || temp_path(target).exists()
}

/// Returns `target` if neither it nor its temp file exists and `reserved`
/// does not hold it, otherwise the first such `name(n).ext` (n = 1, 2, ...).
/// `reserved` covers targets claimed by other items whose temp file may not
/// exist yet.
pub fn disambiguate_with(target: &Path, reserved: impl Fn(&Path) -> bool) -> PathBuf {
    let taken = |p: &Path| occupied(p) || reserved(p);
    if !taken(target) {
        return target.to_path_buf();
    }
    let mut n = 1u32;
    loop {
        let candidate = numbered(target, n);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Renames `temp` to `target` and returns the path the file ended up at.
///
/// Parent directories of `target` are created. If `target` already exists the
/// file is moved to a disambiguated name instead; an existing file is never
/// overwritten. If `temp` is gone and `target` exists the rename already
/// happened and `target` is returned unchanged.
pub fn finalize_download(temp: &Path, target: &Path) -> Result<PathBuf> {
    if !temp.exists() && target.exists() {
        return Ok(target.to_path_buf());
    }
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }
    let dest = if target.exists() {
        let mut n = 1u32;
        loop {
            let candidate = numbered(target, n);
            if !candidate.exists() {
                break candidate;
            }
            n += 1;
        }
    } else {
        target.to_path_buf()
    };
    std::fs::rename(temp, &dest)
        .with_context(|| format!("failed to rename {} to {}", temp.display(), dest.display()))?;
    Ok(dest)
}
