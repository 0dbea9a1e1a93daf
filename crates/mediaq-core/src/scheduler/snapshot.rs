//! Read-only views served to observers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::{ControllerState, Scheduler};
use crate::governor::RateSnapshot;
use crate::queue::{ItemId, Quality, RecordingId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub controller_state: ControllerState,
    #[serde(default)]
    pub catalog_error: Option<String>,
    pub paused: bool,
    pub max_concurrent: usize,
    pub running: Vec<ItemId>,
    pub rate: RateSnapshot,
    pub item_count: usize,
    pub downloaded_count: usize,
    pub recording_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStatus {
    pub id: ItemId,
    pub priority: i64,
    pub recording_id: RecordingId,
    pub title: Option<String>,
    pub quality: Quality,
    pub target: PathBuf,
    pub total_bytes: u64,
    pub loaded_bytes: u64,
    pub downloading: bool,
    pub downloaded: bool,
    pub downloaded_at: Option<i64>,
    pub has_problem: bool,
    pub last_error: Option<String>,
    pub eta_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantStatus {
    pub quality: Quality,
    pub url: String,
    pub auto_enqueued: bool,
    pub auto_downloaded: bool,
    /// Number of queue items for this variant.
    pub queued: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingStatus {
    pub id: RecordingId,
    pub title: String,
    pub first_seen: i64,
    pub marked_deleted: bool,
    pub variants: Vec<VariantStatus>,
}

impl Scheduler {
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            controller_state: self.controller_state,
            catalog_error: self.catalog_error.clone(),
            paused: self.governor.is_paused(),
            max_concurrent: self.cfg.max_concurrent_downloads,
            running: self.running_ids(),
            rate: self.governor.snapshot(),
            item_count: self.state.items.len(),
            downloaded_count: self.state.items.iter().filter(|i| i.downloaded).count(),
            recording_count: self.state.recordings.len(),
        }
    }

    /// Items in priority order.
    pub fn item_statuses(&self) -> Vec<ItemStatus> {
        self.state
            .prioritized_ids()
            .into_iter()
            .filter_map(|id| self.state.get(id))
            .map(|item| ItemStatus {
                id: item.id,
                priority: item.priority,
                recording_id: item.recording_id,
                title: self
                    .state
                    .recordings
                    .get(&item.recording_id)
                    .map(|r| r.title.clone()),
                quality: item.quality,
                target: item.target.clone(),
                total_bytes: item.total_bytes,
                loaded_bytes: item.loaded_bytes(),
                downloading: item.downloading,
                downloaded: item.downloaded,
                downloaded_at: item.downloaded_at,
                has_problem: item.has_problem,
                last_error: item.last_error.clone(),
                eta_secs: item.eta_secs,
            })
            .collect()
    }

    pub fn recording_statuses(&self) -> Vec<RecordingStatus> {
        self.state
            .recordings
            .values()
            .map(|r| RecordingStatus {
                id: r.id,
                title: r.title.clone(),
                first_seen: r.first_seen,
                marked_deleted: r.marked_deleted,
                variants: r
                    .variants
                    .iter()
                    .map(|(quality, v)| VariantStatus {
                        quality: *quality,
                        url: v.url.clone(),
                        auto_enqueued: v.auto_enqueued,
                        auto_downloaded: v.auto_downloaded,
                        queued: self
                            .state
                            .items
                            .iter()
                            .filter(|i| i.recording_id == r.id && i.quality == *quality)
                            .count(),
                    })
                    .collect(),
            })
            .collect()
    }
}
