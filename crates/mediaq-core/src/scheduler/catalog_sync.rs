//! Catalog refresh, upstream deletion of marked recordings and autodownload.

use std::sync::Arc;
use std::time::Instant;

use super::{CommandError, ControllerState, Scheduler, SchedulerEvent};
use crate::catalog::{merge_listing, CatalogError, RecordingDescriptor};
use crate::queue::{ItemId, Quality, RecordingId};
use crate::url_model;

impl Scheduler {
    /// Asks for a catalog refresh on the next tick, also after rejected credentials.
    pub fn request_refresh(&mut self) {
        self.refresh.requested = true;
        self.refresh.credentials_rejected = false;
        self.force_tick = true;
    }

    /// Starts a listing on a worker thread when the refresh interval elapsed
    /// or a refresh was requested. At most one listing is in flight.
    pub(super) fn maybe_refresh(&mut self, now: Instant) {
        if self.refresh.in_flight {
            return;
        }
        let due = match self.refresh.last {
            None => true,
            Some(last) => now.duration_since(last) >= self.cfg.catalog_refresh_interval(),
        };
        if !(self.refresh.requested || due) {
            return;
        }
        if self.refresh.credentials_rejected && !self.refresh.requested {
            return;
        }
        self.refresh.requested = false;
        self.refresh.last = Some(now);

        let (Some(catalog), Some(creds)) = (self.catalog.clone(), self.cfg.catalog.credentials())
        else {
            self.set_controller_state(ControllerState::NoCredentials);
            return;
        };

        let tx = self.events_tx.clone();
        let spawned = std::thread::Builder::new()
            .name("catalog-list".into())
            .spawn(move || {
                let result = catalog.list_recordings(&creds);
                let _ = tx.send(SchedulerEvent::Listing(result));
            });
        match spawned {
            Ok(_) => self.refresh.in_flight = true,
            Err(e) => tracing::error!("failed to start catalog refresh: {}", e),
        }
    }

    pub(super) fn on_listing(
        &mut self,
        result: Result<Vec<RecordingDescriptor>, CatalogError>,
        wall: i64,
    ) {
        self.refresh.in_flight = false;
        match result {
            Ok(listing) => {
                let stats = merge_listing(&mut self.state.recordings, listing, wall);
                tracing::debug!(
                    added = stats.added,
                    updated = stats.updated,
                    removed = stats.removed.len(),
                    "catalog refreshed"
                );
                self.dirty = true;
                self.catalog_error = None;
                self.set_controller_state(ControllerState::Connected);
                self.delete_marked_recordings(wall);
                self.enqueue_automatic_downloads();
            }
            Err(e) => {
                tracing::warn!("catalog refresh failed: {}", e);
                if matches!(e, CatalogError::BadCredentials) {
                    self.refresh.credentials_rejected = true;
                }
                self.catalog_error = Some(e.to_string());
                self.set_controller_state(ControllerState::Error);
            }
        }
    }

    /// Issues one upstream delete per marked recording that has no undownloaded
    /// items and is older than the grace period.
    fn delete_marked_recordings(&mut self, wall: i64) {
        let (Some(catalog), Some(creds)) = (self.catalog.clone(), self.cfg.catalog.credentials())
        else {
            return;
        };
        let grace = self.cfg.delete_grace_period_secs as i64;
        let due: Vec<RecordingId> = self
            .state
            .recordings
            .values()
            .filter(|r| r.marked_deleted)
            .filter(|r| !self.state.has_undownloaded_items(r.id))
            .filter(|r| wall - r.first_seen >= grace)
            .filter(|r| !self.deleting.contains(&r.id) && !self.deleted.contains(&r.id))
            .map(|r| r.id)
            .collect();

        for recording_id in due {
            let catalog = Arc::clone(&catalog);
            let creds = creds.clone();
            let tx = self.events_tx.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("catalog-delete-{}", recording_id))
                .spawn(move || {
                    let result = catalog.delete_recording(&creds, recording_id);
                    let _ = tx.send(SchedulerEvent::Deleted {
                        recording_id,
                        result,
                    });
                });
            match spawned {
                Ok(_) => {
                    tracing::info!(recording = recording_id, "deleting recording upstream");
                    self.deleting.insert(recording_id);
                }
                Err(e) => tracing::error!("failed to start catalog delete: {}", e),
            }
        }
    }

    pub(super) fn on_deleted(&mut self, recording_id: RecordingId, result: Result<(), CatalogError>) {
        self.deleting.remove(&recording_id);
        match result {
            Ok(()) => {
                tracing::info!(recording = recording_id, "recording deleted upstream");
                self.deleted.insert(recording_id);
                self.refresh.requested = true;
            }
            Err(e) => {
                tracing::warn!(recording = recording_id, "upstream delete failed: {}", e);
                if matches!(e, CatalogError::BadCredentials) {
                    self.refresh.credentials_rejected = true;
                    self.catalog_error = Some(e.to_string());
                    self.set_controller_state(ControllerState::Error);
                }
            }
        }
    }

    /// Enqueues every variant the autodownload level selects that was never
    /// auto-enqueued before and has no item yet.
    fn enqueue_automatic_downloads(&mut self) {
        let level = self.cfg.autodownload;
        let mut wanted: Vec<(RecordingId, Quality)> = Vec::new();
        for recording in self.state.recordings.values() {
            for quality in level.select(recording) {
                let already = recording
                    .variants
                    .get(&quality)
                    .map(|v| v.auto_enqueued)
                    .unwrap_or(true);
                if !already && !self.state.has_item_for(recording.id, quality) {
                    wanted.push((recording.id, quality));
                }
            }
        }

        for (recording_id, quality) in wanted {
            match self.add_download(recording_id, quality, true) {
                Ok(item_id) => {
                    tracing::info!(item = item_id, recording = recording_id, %quality, "auto-enqueued");
                    if self.cfg.delete_after_download {
                        if let Some(rec) = self.state.recordings.get_mut(&recording_id) {
                            rec.marked_deleted = true;
                        }
                    }
                }
                Err(e) => tracing::warn!("autodownload failed: {}", e),
            }
        }
    }

    /// Creates an item for a recording variant at the end of the queue.
    pub(super) fn add_download(
        &mut self,
        recording_id: RecordingId,
        quality: Quality,
        auto: bool,
    ) -> Result<ItemId, CommandError> {
        let recording = self
            .state
            .recordings
            .get(&recording_id)
            .ok_or(CommandError::UnknownRecording(recording_id))?;
        let variant = recording
            .variants
            .get(&quality)
            .ok_or(CommandError::UnknownVariant(recording_id, quality))?;
        let fields = url_model::NameFields {
            recording_id,
            title: &recording.title,
            quality,
            url: &variant.url,
            first_seen: recording.first_seen,
        };
        let target =
            url_model::target_path(&self.download_dir, &self.cfg.file_name_pattern, &fields);
        let id = self.state.add_item(recording_id, quality, target);
        if let Some(v) = self.state.variant_mut(recording_id, quality) {
            v.auto_enqueued = auto;
        }
        self.dirty = true;
        self.force_tick = true;
        Ok(id)
    }
}
