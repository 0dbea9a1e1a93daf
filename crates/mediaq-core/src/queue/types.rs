use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::recording::Quality;
use crate::parts::{self, Part};
use crate::storage;

pub type ItemId = i64;
pub type RecordingId = i64;

/// One queued download: a quality variant of a recording.
///
/// `id`, `recording_id` and `quality` never change after creation. The
/// trailing fields are runtime state and are not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    /// Lower runs first; ties go to the lower id.
    pub priority: i64,
    pub recording_id: RecordingId,
    pub quality: Quality,
    /// Total size in bytes; 0 until probed.
    pub total_bytes: u64,
    pub target: PathBuf,
    pub parts: Vec<Part>,
    pub downloaded: bool,
    /// Unix seconds of completion.
    pub downloaded_at: Option<i64>,

    #[serde(skip)]
    pub downloading: bool,
    #[serde(skip)]
    pub has_problem: bool,
    #[serde(skip)]
    pub last_error: Option<String>,
    #[serde(skip)]
    pub eta_secs: Option<u64>,
}

impl Item {
    pub fn new(
        id: ItemId,
        priority: i64,
        recording_id: RecordingId,
        quality: Quality,
        target: PathBuf,
    ) -> Self {
        Self {
            id,
            priority,
            recording_id,
            quality,
            total_bytes: 0,
            target,
            parts: Vec::new(),
            downloaded: false,
            downloaded_at: None,
            downloading: false,
            has_problem: false,
            last_error: None,
            eta_secs: None,
        }
    }

    pub fn sort_key(&self) -> (i64, ItemId) {
        (self.priority, self.id)
    }

    /// `<target>.download`
    pub fn temp_path(&self) -> PathBuf {
        storage::temp_path(&self.target)
    }

    pub fn size_known(&self) -> bool {
        self.total_bytes > 0
    }

    pub fn loaded_bytes(&self) -> u64 {
        if self.downloaded {
            return self.total_bytes;
        }
        parts::loaded_bytes(&self.parts)
    }

    pub fn remaining_bytes(&self) -> Option<u64> {
        if !self.size_known() {
            return None;
        }
        Some(self.total_bytes.saturating_sub(self.loaded_bytes()))
    }

    /// True once parts were planned and every part is complete.
    pub fn all_parts_complete(&self) -> bool {
        !self.parts.is_empty() && self.parts.iter().all(Part::is_complete)
    }

    pub fn clear_runtime_flags(&mut self) {
        self.downloading = false;
        self.has_problem = false;
        self.last_error = None;
        self.eta_secs = None;
    }
}
