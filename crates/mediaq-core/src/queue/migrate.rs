//! One-shot on-disk layout migration, run at load time.
//!
//! Layout 1 downloaded straight into the target path. Layout 2 downloads into
//! `<target>.download` and renames on completion, so an unfinished layout-1
//! item has its partial data under the target name and must be moved.

use std::fs;

use super::QueueState;

pub const CURRENT_LAYOUT_VERSION: u32 = 2;

/// Brings `state` from `from_version` to `CURRENT_LAYOUT_VERSION`. Returns
/// the number of files moved. Failures on single items are logged and skipped.
pub fn migrate(state: &QueueState, from_version: u32) -> usize {
    let mut moved = 0;
    if from_version < 2 {
        for item in state.items.iter().filter(|i| !i.downloaded) {
            let temp = item.temp_path();
            if !item.target.exists() {
                continue;
            }
            if temp.exists() {
                tracing::warn!(
                    item = item.id,
                    target = %item.target.display(),
                    "both target and temp file exist for unfinished item; leaving both"
                );
                continue;
            }
            match fs::rename(&item.target, &temp) {
                Ok(()) => {
                    tracing::info!(item = item.id, "moved legacy partial file to {}", temp.display());
                    moved += 1;
                }
                Err(e) => tracing::warn!(item = item.id, error = %e, "legacy rename failed"),
            }
        }
    }
    moved
}
