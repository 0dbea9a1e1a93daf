//! Per-tick queue maintenance: orphaned items, finalize repair, size probes.

use std::sync::Arc;

use super::{Scheduler, SchedulerEvent};
use crate::queue::ItemId;
use crate::storage;

impl Scheduler {
    pub(super) fn maintain(&mut self) {
        self.remove_orphaned_items();
        self.repair_finalize();
        self.start_probes();
    }

    /// Drops items whose recording or variant vanished from the catalog.
    fn remove_orphaned_items(&mut self) {
        let orphaned: Vec<ItemId> = self
            .state
            .items
            .iter()
            .filter(|i| self.state.variant(i.recording_id, i.quality).is_none())
            .map(|i| i.id)
            .collect();
        for id in orphaned {
            if let Some(job) = self.jobs.get(&id) {
                job.request_stop();
            }
            self.state.remove(id);
            self.dirty = true;
            tracing::info!(item = id, "recording no longer listed, item removed");
        }
    }

    /// Completes the rename for downloaded items whose temp file is still there
    /// (crash between completion and rename, or a failed rename).
    fn repair_finalize(&mut self) {
        for item in self.state.items.iter_mut().filter(|i| i.downloaded) {
            let temp = item.temp_path();
            if !temp.exists() || item.target.exists() {
                continue;
            }
            match storage::finalize_download(&temp, &item.target) {
                Ok(path) => {
                    tracing::info!(item = item.id, target = %path.display(), "finished pending rename");
                    item.target = path;
                    item.has_problem = false;
                    item.last_error = None;
                    self.dirty = true;
                }
                Err(e) => {
                    item.has_problem = true;
                    item.last_error = Some(format!("finalize failed: {:#}", e));
                }
            }
        }
    }

    /// Spawns a size probe for each unsized item that is not running or probing.
    fn start_probes(&mut self) {
        let wanted: Vec<(ItemId, String)> = self
            .state
            .items
            .iter()
            .filter(|i| !i.downloaded && !i.size_known())
            .filter(|i| !self.probing.contains(&i.id) && !self.jobs.contains_key(&i.id))
            .filter_map(|i| self.state.source_url(i).map(|u| (i.id, u.to_string())))
            .collect();

        for (item_id, url) in wanted {
            let probe = Arc::clone(&self.probe);
            let tx = self.events_tx.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("probe-{}", item_id))
                .spawn(move || {
                    let result = probe.probe_size(&url).map_err(|e| format!("{:#}", e));
                    let _ = tx.send(SchedulerEvent::Probe { item_id, result });
                });
            match spawned {
                Ok(_) => {
                    self.probing.insert(item_id);
                }
                Err(e) => tracing::error!("failed to start size probe: {}", e),
            }
        }
    }
}
