//! Control commands applied by the scheduler.

use serde_json::json;

use super::Scheduler;
use crate::control::{ControlRequest, ControlResponse};
use crate::queue::{ItemId, Quality, RecordingId, Reorder};

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("no item with id {0}")]
    UnknownItem(ItemId),
    #[error("no recording with id {0}")]
    UnknownRecording(RecordingId),
    #[error("recording {0} has no {1} variant")]
    UnknownVariant(RecordingId, Quality),
    #[error("invalid request: {0}")]
    Invalid(String),
}

impl Scheduler {
    /// Applies one control request and builds its response.
    pub fn dispatch(&mut self, request: ControlRequest) -> ControlResponse {
        tracing::debug!(?request, "control request");
        let result = match request {
            ControlRequest::Status => return ControlResponse::with_result(&self.status()),
            ControlRequest::Items => return ControlResponse::with_result(&self.item_statuses()),
            ControlRequest::Recordings => {
                return ControlResponse::with_result(&self.recording_statuses())
            }
            ControlRequest::Enqueue {
                recording_id,
                quality,
            } => self
                .enqueue(recording_id, quality)
                .map(|id| Some(json!({ "item_id": id }))),
            ControlRequest::Remove { item_id } => self.remove_item(item_id).map(|_| None),
            ControlRequest::Reorder { item_id, change } => {
                self.reorder(item_id, change).map(|_| None)
            }
            ControlRequest::Pause => {
                self.set_paused(true);
                Ok(None)
            }
            ControlRequest::Resume => {
                self.set_paused(false);
                Ok(None)
            }
            ControlRequest::SetSpeedLimit { bytes_per_sec } => {
                self.set_speed_limit(bytes_per_sec);
                Ok(None)
            }
            ControlRequest::SetMaxConcurrent { slots } => self.set_max_concurrent(slots).map(|_| None),
            ControlRequest::MarkRecordingDeleted {
                recording_id,
                marked,
            } => self
                .mark_recording_deleted(recording_id, marked)
                .map(|_| None),
            ControlRequest::Refresh => {
                self.request_refresh();
                Ok(None)
            }
            ControlRequest::Shutdown => {
                self.shutdown_requested = true;
                Ok(None)
            }
        };
        match result {
            Ok(Some(value)) => ControlResponse::with_result(&value),
            Ok(None) => ControlResponse::ok(),
            Err(e) => ControlResponse::error(e.to_string()),
        }
    }

    /// Manually enqueues a recording variant at the end of the queue.
    /// Enqueueing the same variant twice creates two items.
    pub fn enqueue(&mut self, recording_id: RecordingId, quality: Quality) -> Result<ItemId, CommandError> {
        let id = self.add_download(recording_id, quality, false)?;
        tracing::info!(item = id, recording = recording_id, %quality, "enqueued");
        Ok(id)
    }

    /// Removes an item from the queue, stopping its job. Files on disk are kept.
    pub fn remove_item(&mut self, item_id: ItemId) -> Result<(), CommandError> {
        if let Some(job) = self.jobs.get(&item_id) {
            job.request_stop();
        }
        self.state
            .remove(item_id)
            .ok_or(CommandError::UnknownItem(item_id))?;
        self.probing.remove(&item_id);
        self.dirty = true;
        self.force_tick = true;
        tracing::info!(item = item_id, "item removed");
        Ok(())
    }

    pub fn reorder(&mut self, item_id: ItemId, change: Reorder) -> Result<(), CommandError> {
        if !self.state.reorder(item_id, change) {
            return Err(CommandError::UnknownItem(item_id));
        }
        self.dirty = true;
        self.force_tick = true;
        Ok(())
    }

    /// Global pause: admits nothing and stops running jobs on the next tick.
    pub fn set_paused(&mut self, paused: bool) {
        self.governor.set_paused(paused);
        self.cfg.paused = paused;
        self.config_dirty = true;
        self.force_tick = true;
        tracing::info!(paused, "pause changed");
    }

    /// Aggregate ceiling in bytes/sec; 0 removes the limit.
    pub fn set_speed_limit(&mut self, bytes_per_sec: u64) {
        self.governor.set_ceiling(bytes_per_sec);
        self.cfg.max_bytes_per_sec = (bytes_per_sec > 0).then_some(bytes_per_sec);
        self.config_dirty = true;
        self.force_tick = true;
        tracing::info!(bytes_per_sec, "speed limit changed");
    }

    pub fn set_max_concurrent(&mut self, slots: usize) -> Result<(), CommandError> {
        if slots == 0 {
            return Err(CommandError::Invalid(
                "slots must be at least 1 (use pause to stop all transfers)".into(),
            ));
        }
        self.cfg.max_concurrent_downloads = slots;
        self.config_dirty = true;
        self.force_tick = true;
        tracing::info!(slots, "concurrency changed");
        Ok(())
    }

    pub fn mark_recording_deleted(
        &mut self,
        recording_id: RecordingId,
        marked: bool,
    ) -> Result<(), CommandError> {
        let recording = self
            .state
            .recordings
            .get_mut(&recording_id)
            .ok_or(CommandError::UnknownRecording(recording_id))?;
        recording.marked_deleted = marked;
        self.dirty = true;
        Ok(())
    }
}
