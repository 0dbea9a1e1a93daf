//! Transfer job: downloads one item by running one fetcher per incomplete part.
//!
//! `prepare` decides whether the item resumes or starts from scratch (fresh
//! parts, collision-free target name). `spawn` runs the job on its own thread,
//! which opens or creates the temp file, starts the part workers, joins them
//! and hands a `JobReport` to the caller's callback. The download-to-target
//! rename is done by the scheduler when it reconciles a completed report.

mod progress;

pub use progress::JobProgress;

use anyhow::Result;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::fetcher::{FetchSettings, RangeFetcher};
use crate::governor::RateGovernor;
use crate::parts::{plan_parts, Part};
use crate::queue::{Item, ItemId};
use crate::retry::FetchError;
use crate::storage::{self, StorageWriter, StorageWriterBuilder};

/// Everything a job needs besides the item itself.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub settings: FetchSettings,
    pub governor: Arc<RateGovernor>,
}

/// Immutable description of the work, taken from the item at start.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub item_id: ItemId,
    pub temp_path: PathBuf,
    pub total_bytes: u64,
    pub parts: Vec<Part>,
    /// Create and preallocate a new temp file instead of reopening it.
    pub fresh: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Every part reached its full length and the temp file was synced.
    Completed,
    /// Stop was requested before the item finished.
    Stopped,
    /// Parts ended short without a stop request.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct JobReport {
    pub item_id: ItemId,
    pub outcome: JobOutcome,
    /// Final part state (loaded counters as written to disk).
    pub parts: Vec<Part>,
}

/// Readies `item` for a transfer. Returns true if it starts from scratch.
///
/// An item resumes when it has parts and its temp file exists. Otherwise its
/// parts are replanned and, if the target or temp path is taken on disk or
/// the target is in `claimed` (targets of other started items), the target
/// is moved to the first free `name(n).ext`.
pub fn prepare(item: &mut Item, parts_per_item: usize, claimed: &HashSet<PathBuf>) -> bool {
    if !item.parts.is_empty() && item.temp_path().exists() {
        return false;
    }
    let free = storage::disambiguate_with(&item.target, |p| claimed.contains(p));
    if free != item.target {
        tracing::info!(
            item = item.id,
            from = %item.target.display(),
            to = %free.display(),
            "target name taken, using disambiguated name"
        );
        item.target = free;
    }
    item.parts = plan_parts(item.total_bytes, parts_per_item.max(1));
    true
}

/// A running job. Dropping the handle does not stop the job; call `request_stop`.
#[derive(Debug)]
pub struct JobHandle {
    pub item_id: ItemId,
    stop: Arc<AtomicBool>,
    progress: Arc<JobProgress>,
    thread: Option<JoinHandle<()>>,
}

impl JobHandle {
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    pub fn progress(&self) -> &JobProgress {
        &self.progress
    }

    /// Waits for the job thread to exit.
    pub fn join(mut self) {
        if let Some(t) = self.thread.take() {
            if t.join().is_err() {
                tracing::error!(item = self.item_id, "job thread panicked");
            }
        }
    }
}

/// Starts `spec` on a new thread; `on_done` receives the report when every part worker exited.
pub fn spawn<F>(spec: JobSpec, ctx: JobContext, on_done: F) -> std::io::Result<JobHandle>
where
    F: FnOnce(JobReport) + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let progress = Arc::new(JobProgress::new(&spec.parts));
    let item_id = spec.item_id;

    let thread = {
        let stop = Arc::clone(&stop);
        let progress = Arc::clone(&progress);
        std::thread::Builder::new()
            .name(format!("job-{}", item_id))
            .spawn(move || {
                let mut parts = spec.parts.clone();
                let outcome = run_job(&spec, &ctx, &stop, &progress);
                progress.apply_to(&mut parts);
                tracing::info!(item = item_id, ?outcome, "job finished");
                on_done(JobReport {
                    item_id,
                    outcome,
                    parts,
                });
            })?
    };

    Ok(JobHandle {
        item_id,
        stop,
        progress,
        thread: Some(thread),
    })
}

fn open_storage(spec: &JobSpec) -> Result<StorageWriter> {
    if !spec.fresh && spec.temp_path.exists() {
        return StorageWriter::open_existing(&spec.temp_path);
    }
    let mut builder = StorageWriterBuilder::create(&spec.temp_path)?;
    builder.preallocate(spec.total_bytes)?;
    Ok(builder.build())
}

fn run_job(
    spec: &JobSpec,
    ctx: &JobContext,
    stop: &Arc<AtomicBool>,
    progress: &Arc<JobProgress>,
) -> JobOutcome {
    let writer = match open_storage(spec) {
        Ok(w) => w,
        Err(e) => {
            let msg = format!("{:#}", e);
            progress.report_problem(msg.clone());
            return JobOutcome::Failed(msg);
        }
    };

    let mut last_error: Option<String> = None;
    let mut workers = Vec::new();
    for (index, part) in spec.parts.iter().enumerate() {
        if part.is_complete() {
            continue;
        }
        let fetcher = RangeFetcher {
            item_id: spec.item_id,
            index,
            part: *part,
            settings: ctx.settings.clone(),
            governor: Arc::clone(&ctx.governor),
            writer: writer.clone(),
            progress: Arc::clone(progress),
            stop: Arc::clone(stop),
        };
        let spawned = std::thread::Builder::new()
            .name(format!("job-{}-part-{}", spec.item_id, index))
            .spawn(move || fetcher.run());
        match spawned {
            Ok(h) => workers.push(h),
            Err(e) => last_error = Some(format!("failed to start part worker: {}", e)),
        }
    }
    tracing::debug!(item = spec.item_id, workers = workers.len(), "part workers started");

    for worker in workers {
        match worker.join() {
            Ok(Ok(())) | Ok(Err(FetchError::Stopped)) => {}
            Ok(Err(e)) => last_error = Some(e.to_string()),
            Err(_) => last_error = Some("part worker panicked".to_string()),
        }
    }

    let complete = (0..spec.parts.len()).all(|i| progress.loaded(i) >= spec.parts[i].length);
    if complete && !spec.parts.is_empty() {
        return match writer.sync() {
            Ok(()) => JobOutcome::Completed,
            Err(e) => JobOutcome::Failed(format!("{:#}", e)),
        };
    }
    if stop.load(Ordering::Relaxed) {
        return JobOutcome::Stopped;
    }
    JobOutcome::Failed(
        last_error.unwrap_or_else(|| "Shutdown before file was finished".to_string()),
    )
}
