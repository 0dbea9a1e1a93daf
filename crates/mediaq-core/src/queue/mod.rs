//! Queue data model: items, recordings and their priority ordering.
//!
//! The scheduler is the only writer of `QueueState`. Items reference a
//! recording variant by `(recording_id, quality)`; the variant URL is looked up
//! from the recording cache, never copied into the item.

pub mod migrate;
mod recording;
mod types;

pub use recording::{Quality, Recording, Variant};
pub use types::{Item, ItemId, RecordingId};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Relative or absolute priority change for `QueueState::reorder`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reorder {
    /// Set the item's priority value directly.
    To(i64),
    /// Swap with the item just ahead of it in priority order.
    Up,
    /// Swap with the item just behind it in priority order.
    Down,
}

#[derive(Debug, Clone, Default)]
pub struct QueueState {
    pub items: Vec<Item>,
    pub recordings: BTreeMap<RecordingId, Recording>,
}

impl QueueState {
    pub fn next_item_id(&self) -> ItemId {
        self.items.iter().map(|i| i.id).max().unwrap_or(0) + 1
    }

    /// Priority value one past the least favorable existing priority.
    pub fn next_priority(&self) -> i64 {
        self.items.iter().map(|i| i.priority).max().unwrap_or(0) + 1
    }

    /// Appends a new item at the end of the priority order and returns its id.
    pub fn add_item(&mut self, recording_id: RecordingId, quality: Quality, target: PathBuf) -> ItemId {
        let id = self.next_item_id();
        let priority = self.next_priority();
        self.items
            .push(Item::new(id, priority, recording_id, quality, target));
        id
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.iter_mut().find(|i| i.id == id)
    }

    pub fn remove(&mut self, id: ItemId) -> Option<Item> {
        let pos = self.items.iter().position(|i| i.id == id)?;
        Some(self.items.remove(pos))
    }

    /// Ids of all items sorted by (priority, id).
    pub fn prioritized_ids(&self) -> Vec<ItemId> {
        let mut keyed: Vec<_> = self.items.iter().map(|i| i.sort_key()).collect();
        keyed.sort_unstable();
        keyed.into_iter().map(|(_, id)| id).collect()
    }

    /// Applies a priority change. Relative moves renumber all items 1..=n in
    /// the resulting order. Returns false if the item does not exist.
    pub fn reorder(&mut self, id: ItemId, change: Reorder) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        match change {
            Reorder::To(priority) => {
                if let Some(item) = self.get_mut(id) {
                    item.priority = priority;
                }
            }
            Reorder::Up | Reorder::Down => {
                let mut order = self.prioritized_ids();
                if let Some(pos) = order.iter().position(|i| *i == id) {
                    match change {
                        Reorder::Up if pos > 0 => order.swap(pos, pos - 1),
                        Reorder::Down if pos + 1 < order.len() => order.swap(pos, pos + 1),
                        _ => {}
                    }
                }
                for (rank, item_id) in order.into_iter().enumerate() {
                    if let Some(item) = self.get_mut(item_id) {
                        item.priority = rank as i64 + 1;
                    }
                }
            }
        }
        true
    }

    /// True if any item of `recording_id` is not downloaded yet.
    pub fn has_undownloaded_items(&self, recording_id: RecordingId) -> bool {
        self.items
            .iter()
            .any(|i| i.recording_id == recording_id && !i.downloaded)
    }

    pub fn has_item_for(&self, recording_id: RecordingId, quality: Quality) -> bool {
        self.items
            .iter()
            .any(|i| i.recording_id == recording_id && i.quality == quality)
    }

    pub fn variant(&self, recording_id: RecordingId, quality: Quality) -> Option<&Variant> {
        self.recordings.get(&recording_id)?.variants.get(&quality)
    }

    pub fn variant_mut(&mut self, recording_id: RecordingId, quality: Quality) -> Option<&mut Variant> {
        self.recordings
            .get_mut(&recording_id)?
            .variants
            .get_mut(&quality)
    }

    /// URL of the variant an item downloads, if the recording still offers it.
    pub fn source_url(&self, item: &Item) -> Option<&str> {
        self.variant(item.recording_id, item.quality)
            .map(|v| v.url.as_str())
    }
}
