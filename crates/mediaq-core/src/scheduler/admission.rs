//! Admission: which items occupy a slot.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Instant;

use super::Scheduler;
use crate::fetcher::FetchSettings;
use crate::governor::{estimate_etas, EtaInput};
use crate::job::{self, JobContext, JobSpec};
use crate::queue::{Item, ItemId};
use crate::retry::RetryPolicy;

use super::SchedulerEvent;

/// The first `slots` items by (priority, id) that are not downloaded and whose
/// size is known. Independent of the order of `items`.
pub fn admitted_ids(items: &[Item], slots: usize) -> Vec<ItemId> {
    let mut candidates: Vec<&Item> = items
        .iter()
        .filter(|i| !i.downloaded && i.size_known())
        .collect();
    candidates.sort_by_key(|i| i.sort_key());
    candidates.into_iter().take(slots).map(|i| i.id).collect()
}

impl Scheduler {
    /// Configured slots, or 0 while paused or shutting down.
    pub fn effective_slots(&self) -> usize {
        if self.governor.is_paused() || self.shutdown_requested {
            0
        } else {
            self.cfg.max_concurrent_downloads
        }
    }

    /// Starts jobs for admitted items and stops jobs of items that dropped out.
    /// An admitted item whose last job failed keeps its slot without a job
    /// until its retry delay has passed.
    pub(super) fn admit(&mut self, now: Instant) {
        self.backoff.retain(|_, until| *until > now);
        let slots = self.effective_slots();
        let admitted = admitted_ids(&self.state.items, slots);
        let admitted_set: HashSet<ItemId> = admitted.iter().copied().collect();

        for (id, job) in &self.jobs {
            if !admitted_set.contains(id) && !job.stop_requested() {
                tracing::info!(item = id, "item no longer admitted, stopping");
                job.request_stop();
            }
        }

        let mut free = slots.saturating_sub(self.jobs.len());
        for id in admitted {
            if free == 0 {
                break;
            }
            if self.jobs.contains_key(&id) {
                continue;
            }
            if self.backoff.contains_key(&id) {
                free -= 1;
                continue;
            }
            if self.start_job(id, now) {
                free -= 1;
            }
        }
    }

    fn start_job(&mut self, id: ItemId, now: Instant) -> bool {
        let Some(url) = self
            .state
            .get(id)
            .and_then(|item| self.state.source_url(item))
            .map(str::to_string)
        else {
            return false;
        };
        // Names of other items that already started; their temp files may not
        // exist yet because job threads create them.
        let claimed: HashSet<PathBuf> = self
            .state
            .items
            .iter()
            .filter(|i| i.id != id && !i.downloaded && !i.parts.is_empty())
            .map(|i| i.target.clone())
            .collect();
        let Some(item) = self.state.get_mut(id) else {
            return false;
        };

        let fresh = job::prepare(item, self.cfg.parts_per_item, &claimed);
        self.dirty = true;
        let spec = JobSpec {
            item_id: id,
            temp_path: item.temp_path(),
            total_bytes: item.total_bytes,
            parts: item.parts.clone(),
            fresh,
        };
        let ctx = JobContext {
            settings: FetchSettings {
                url,
                user_agent: self.cfg.user_agent.clone(),
                connect_timeout: self.cfg.connect_timeout(),
                retry: RetryPolicy::fixed(self.cfg.retry_delay()),
            },
            governor: self.governor.clone(),
        };
        let tx = self.events_tx.clone();
        match job::spawn(spec, ctx, move |report| {
            let _ = tx.send(SchedulerEvent::Job(report));
        }) {
            Ok(handle) => {
                tracing::info!(
                    item = id,
                    fresh,
                    target = %item.target.display(),
                    "starting download"
                );
                item.downloading = true;
                self.jobs.insert(id, handle);
                true
            }
            Err(e) => {
                tracing::error!(item = id, "failed to start job: {}", e);
                item.has_problem = true;
                item.last_error = Some(format!("failed to start job: {}", e));
                self.backoff.insert(id, now + self.cfg.retry_delay());
                false
            }
        }
    }

    /// Copies live part progress and problem flags of running jobs into their items.
    pub(super) fn sync_progress(&mut self) {
        for (id, job) in &self.jobs {
            if let Some(item) = self.state.get_mut(*id) {
                let progress = job.progress();
                progress.apply_to(&mut item.parts);
                item.has_problem = progress.has_problem();
                if let Some(err) = progress.last_error() {
                    item.last_error = Some(err);
                }
            }
        }
    }

    pub(super) fn update_etas(&mut self) {
        let order = self.state.prioritized_ids();
        let inputs: Vec<EtaInput> = order
            .iter()
            .filter_map(|id| self.state.get(*id))
            .map(|item| EtaInput {
                remaining: item.remaining_bytes(),
                downloading: item.downloading,
                completed: item.downloaded,
            })
            .collect();
        let etas = estimate_etas(
            &inputs,
            self.cfg.max_concurrent_downloads,
            self.governor.aggregate_speed(),
        );
        for (id, eta) in order.iter().zip(etas) {
            if let Some(item) = self.state.get_mut(*id) {
                item.eta_secs = eta;
            }
        }
    }
}
