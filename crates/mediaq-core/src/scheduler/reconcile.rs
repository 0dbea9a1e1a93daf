//! Applying worker results to the queue.

use std::time::Instant;

use super::{EngineError, Scheduler, SchedulerEvent};
use crate::job::{JobOutcome, JobReport};
use crate::queue::ItemId;
use crate::storage;

impl Scheduler {
    pub(super) fn handle_event(
        &mut self,
        event: SchedulerEvent,
        now: Instant,
        wall: i64,
    ) -> Result<(), EngineError> {
        match event {
            SchedulerEvent::Job(report) => self.on_job_report(report, now, wall)?,
            SchedulerEvent::Probe { item_id, result } => self.on_probe(item_id, result),
            SchedulerEvent::Listing(result) => self.on_listing(result, wall),
            SchedulerEvent::Deleted {
                recording_id,
                result,
            } => self.on_deleted(recording_id, result),
        }
        Ok(())
    }

    fn on_job_report(&mut self, report: JobReport, now: Instant, wall: i64) -> Result<(), EngineError> {
        if let Some(handle) = self.jobs.remove(&report.item_id) {
            handle.join();
        }
        let Some(item) = self.state.get_mut(report.item_id) else {
            tracing::debug!(item = report.item_id, "report for removed item ignored");
            return Ok(());
        };
        item.downloading = false;
        item.eta_secs = None;
        self.dirty = true;

        if item.parts.len() != report.parts.len() {
            return Err(EngineError::Invariant(format!(
                "item {} reported {} parts, queue has {}",
                item.id,
                report.parts.len(),
                item.parts.len()
            )));
        }
        for (part, reported) in item.parts.iter_mut().zip(&report.parts) {
            part.advance_to(reported.loaded);
        }

        match report.outcome {
            JobOutcome::Completed => {
                if item.downloaded {
                    return Ok(());
                }
                let loaded = item.loaded_bytes();
                if loaded != item.total_bytes {
                    return Err(EngineError::Invariant(format!(
                        "item {} completed with {} of {} bytes",
                        item.id, loaded, item.total_bytes
                    )));
                }
                item.downloaded = true;
                item.downloaded_at = Some(wall);
                item.has_problem = false;
                item.last_error = None;
                match storage::finalize_download(&item.temp_path(), &item.target) {
                    Ok(path) => {
                        if path != item.target {
                            tracing::info!(
                                item = item.id,
                                target = %path.display(),
                                "target existed, finalized under a new name"
                            );
                            item.target = path;
                        }
                    }
                    Err(e) => {
                        tracing::error!(item = item.id, "finalize failed: {:#}", e);
                        item.has_problem = true;
                        item.last_error = Some(format!("finalize failed: {:#}", e));
                    }
                }
                tracing::info!(item = item.id, target = %item.target.display(), "download complete");
                let (recording_id, quality) = (item.recording_id, item.quality);
                if let Some(variant) = self.state.variant_mut(recording_id, quality) {
                    if variant.auto_enqueued {
                        variant.auto_downloaded = true;
                    }
                }
            }
            JobOutcome::Stopped => {
                tracing::debug!(item = item.id, loaded = item.loaded_bytes(), "download stopped");
            }
            JobOutcome::Failed(message) => {
                let delay = self.cfg.retry_delay();
                tracing::warn!(
                    item = item.id,
                    retry_in_ms = delay.as_millis() as u64,
                    "download failed: {}",
                    message
                );
                item.has_problem = true;
                item.last_error = Some(message);
                self.backoff.insert(item.id, now + delay);
                let recording_id = item.recording_id;
                if let Some(rec) = self.state.recordings.get_mut(&recording_id) {
                    if rec.marked_deleted {
                        tracing::info!(recording = recording_id, "download failed, keeping recording upstream");
                        rec.marked_deleted = false;
                    }
                }
            }
        }
        Ok(())
    }

    fn on_probe(&mut self, item_id: ItemId, result: Result<u64, String>) {
        self.probing.remove(&item_id);
        let Some(item) = self.state.get_mut(item_id) else {
            return;
        };
        match result {
            Ok(size) => {
                tracing::info!(item = item_id, size, "probed size");
                item.total_bytes = size;
                item.last_error = None;
                self.dirty = true;
            }
            Err(e) => {
                tracing::warn!(item = item_id, "size probe failed: {}", e);
                item.last_error = Some(e);
            }
        }
    }
}
