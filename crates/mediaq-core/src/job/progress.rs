//! Live per-part progress shared between a job's part workers and the scheduler.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::parts::Part;

#[derive(Debug)]
struct PartSlot {
    length: u64,
    loaded: AtomicU64,
    connected: AtomicBool,
}

/// Progress of one running item. Each part's counter has a single writer (its
/// fetcher) and only ever grows, capped at the part length.
#[derive(Debug)]
pub struct JobProgress {
    parts: Vec<PartSlot>,
    has_problem: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl JobProgress {
    pub fn new(parts: &[Part]) -> Self {
        Self {
            parts: parts
                .iter()
                .map(|p| PartSlot {
                    length: p.length,
                    loaded: AtomicU64::new(p.loaded.min(p.length)),
                    connected: AtomicBool::new(false),
                })
                .collect(),
            has_problem: AtomicBool::new(false),
            last_error: Mutex::new(None),
        }
    }

    pub fn loaded(&self, idx: usize) -> u64 {
        self.parts
            .get(idx)
            .map(|p| p.loaded.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    /// Adds `n` bytes to part `idx`, clamped to its length. Returns the new value.
    pub fn advance(&self, idx: usize, n: u64) -> u64 {
        let Some(slot) = self.parts.get(idx) else {
            return 0;
        };
        let prev = slot
            .loaded
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                Some(cur.saturating_add(n).min(slot.length))
            })
            .unwrap_or_else(|cur| cur);
        prev.saturating_add(n).min(slot.length)
    }

    pub fn loaded_total(&self) -> u64 {
        (0..self.parts.len()).map(|i| self.loaded(i)).sum()
    }

    /// A part received its first response bytes. Clears the problem flag once
    /// every part is either connected or complete.
    pub fn part_connected(&self, idx: usize) {
        if let Some(slot) = self.parts.get(idx) {
            slot.connected.store(true, Ordering::Release);
        }
        let healthy = self.parts.iter().all(|p| {
            p.connected.load(Ordering::Acquire) || p.loaded.load(Ordering::Acquire) >= p.length
        });
        if healthy {
            self.has_problem.store(false, Ordering::Release);
        }
    }

    pub fn part_disconnected(&self, idx: usize) {
        if let Some(slot) = self.parts.get(idx) {
            slot.connected.store(false, Ordering::Release);
        }
    }

    pub fn report_problem(&self, message: String) {
        self.has_problem.store(true, Ordering::Release);
        let mut guard = self.last_error.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(message);
    }

    pub fn has_problem(&self) -> bool {
        self.has_problem.load(Ordering::Acquire)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Raises `parts[i].loaded` to the live counter; never lowers it.
    pub fn apply_to(&self, parts: &mut [Part]) {
        for (i, part) in parts.iter_mut().enumerate() {
            part.advance_to(self.loaded(i));
        }
    }
}
