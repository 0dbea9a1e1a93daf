//! Range fetcher: one resumable, throttled HTTP range transfer for one part.
//!
//! The fetcher requests `[offset + loaded, offset + length - 1]`, accepts only
//! `206 Partial Content`, writes at absolute file offsets through the item's
//! shared `StorageWriter` and advances the part's `loaded` counter. It
//! registers with the rate governor while connected, sleeps off any excess
//! over the per-slot allowance, and retries transient failures in place after
//! a fixed delay, always resuming from the current `loaded`.

mod throttle;
mod transfer;

pub use throttle::{Throttle, CHECK_BLOCK_BYTES, REPORT_INTERVAL};
pub use transfer::parse_status_line;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::governor::RateGovernor;
use crate::job::JobProgress;
use crate::parts::Part;
use crate::queue::ItemId;
use crate::retry::{run_with_retry, FetchError, RetryPolicy};
use crate::storage::StorageWriter;

/// No bytes for this long aborts the attempt (then retried).
pub const STALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings shared by every part of one item.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub url: String,
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub retry: RetryPolicy,
}

/// Fetches one part. `progress` holds the live `loaded` counter for `index`.
pub struct RangeFetcher {
    pub item_id: ItemId,
    pub index: usize,
    pub part: Part,
    pub settings: FetchSettings,
    pub governor: Arc<RateGovernor>,
    pub writer: StorageWriter,
    pub progress: Arc<JobProgress>,
    pub stop: Arc<AtomicBool>,
}

impl RangeFetcher {
    /// Runs until the part is complete, a non-retryable error occurs or stop is raised.
    pub fn run(&self) -> Result<(), FetchError> {
        let result = run_with_retry(
            &self.settings.retry,
            &self.stop,
            || self.attempt(),
            |e, kind, delay| {
                tracing::warn!(
                    item = self.item_id,
                    part = self.index,
                    kind = kind.label(),
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "part transfer failed, retrying"
                );
                self.progress
                    .report_problem(format!("{}: {}", kind.label(), e));
            },
        );
        match &result {
            Ok(()) => tracing::debug!(item = self.item_id, part = self.index, "part complete"),
            Err(FetchError::Stopped) => {
                tracing::debug!(item = self.item_id, part = self.index, "part stopped")
            }
            Err(e) => {
                tracing::warn!(item = self.item_id, part = self.index, error = %e, "part gave up");
                self.progress.report_problem(e.to_string());
            }
        }
        result
    }
}
