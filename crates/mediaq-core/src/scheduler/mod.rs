//! Scheduler: the single writer of the queue.
//!
//! Every tick the scheduler drains reports from worker threads (job outcomes,
//! size probes, catalog calls), refreshes the catalog when due, performs queue
//! maintenance, decides the admitted set by priority and starts or stops
//! transfer jobs to match, then recomputes ETAs. Network work never runs on the
//! tick itself. The async `run` loop drives ticks, serves control commands and
//! persists the queue.

mod admission;
mod catalog_sync;
mod commands;
mod maintenance;
mod reconcile;
mod run;
mod snapshot;

#[cfg(test)]
mod tests;

pub use admission::admitted_ids;
pub use commands::CommandError;
pub use run::{channel, run, Command, RunOptions, SchedulerHandle};
pub use snapshot::{ItemStatus, RecordingStatus, StatusSnapshot, VariantStatus};

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::catalog::{CatalogApi, CatalogError, RecordingDescriptor};
use crate::config::MediaqConfig;
use crate::governor::RateGovernor;
use crate::job::{JobHandle, JobReport};
use crate::probe::SizeProbe;
use crate::queue::{ItemId, QueueState, RecordingId};
use crate::store::unix_timestamp;

/// Catalog connectivity as seen by observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    /// No catalog call has completed yet.
    Unknown,
    /// Username, password or catalog URL are not configured.
    NoCredentials,
    Connected,
    /// Last catalog call failed (see `StatusSnapshot::catalog_error`).
    Error,
}

/// Unrecoverable scheduler failure. The host must stop everything and exit.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine invariant violated: {0}")]
    Invariant(String),
}

/// Results delivered from worker threads to the tick.
#[derive(Debug)]
pub(crate) enum SchedulerEvent {
    Job(JobReport),
    Probe {
        item_id: ItemId,
        result: Result<u64, String>,
    },
    Listing(Result<Vec<RecordingDescriptor>, CatalogError>),
    Deleted {
        recording_id: RecordingId,
        result: Result<(), CatalogError>,
    },
}

#[derive(Debug, Default)]
struct RefreshState {
    in_flight: bool,
    requested: bool,
    last: Option<Instant>,
    /// Set after the catalog rejected the credentials; only an explicit refresh retries.
    credentials_rejected: bool,
}

pub struct Scheduler {
    cfg: MediaqConfig,
    download_dir: PathBuf,
    state: QueueState,
    governor: Arc<RateGovernor>,
    catalog: Option<Arc<dyn CatalogApi>>,
    probe: Arc<dyn SizeProbe>,
    jobs: HashMap<ItemId, JobHandle>,
    /// Items whose last job failed, with the earliest restart time.
    backoff: HashMap<ItemId, Instant>,
    probing: HashSet<ItemId>,
    refresh: RefreshState,
    deleting: HashSet<RecordingId>,
    deleted: HashSet<RecordingId>,
    controller_state: ControllerState,
    catalog_error: Option<String>,
    events_tx: Sender<SchedulerEvent>,
    events_rx: Receiver<SchedulerEvent>,
    dirty: bool,
    config_dirty: bool,
    force_tick: bool,
    shutdown_requested: bool,
}

impl Scheduler {
    pub fn new(
        cfg: MediaqConfig,
        mut state: QueueState,
        catalog: Option<Arc<dyn CatalogApi>>,
        probe: Arc<dyn SizeProbe>,
    ) -> Self {
        let download_dir = cfg
            .download_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let governor = Arc::new(RateGovernor::new(cfg.ceiling()));
        governor.set_paused(cfg.paused);
        for item in &mut state.items {
            item.clear_runtime_flags();
        }
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            cfg,
            download_dir,
            state,
            governor,
            catalog,
            probe,
            jobs: HashMap::new(),
            backoff: HashMap::new(),
            probing: HashSet::new(),
            refresh: RefreshState::default(),
            deleting: HashSet::new(),
            deleted: HashSet::new(),
            controller_state: ControllerState::Unknown,
            catalog_error: None,
            events_tx,
            events_rx,
            dirty: false,
            config_dirty: false,
            force_tick: false,
            shutdown_requested: false,
        }
    }

    pub fn state(&self) -> &QueueState {
        &self.state
    }

    pub fn config(&self) -> &MediaqConfig {
        &self.cfg
    }

    pub fn governor(&self) -> &Arc<RateGovernor> {
        &self.governor
    }

    pub fn controller_state(&self) -> ControllerState {
        self.controller_state
    }

    /// Item ids with a running (or stopping) transfer job.
    pub fn running_ids(&self) -> Vec<ItemId> {
        let mut ids: Vec<_> = self.jobs.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// True once since the last call if the queue changed structurally.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// True once since the last call if runtime settings changed.
    pub fn take_config_dirty(&mut self) -> bool {
        std::mem::take(&mut self.config_dirty)
    }

    /// True once since the last call if a command asked for an immediate tick.
    pub fn take_force_tick(&mut self) -> bool {
        std::mem::take(&mut self.force_tick)
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }

    pub fn tick(&mut self) -> Result<(), EngineError> {
        self.tick_at(Instant::now(), unix_timestamp())
    }

    /// One scheduling pass. `now` drives refresh timing, `wall` (Unix seconds)
    /// stamps completions and new recordings.
    pub fn tick_at(&mut self, now: Instant, wall: i64) -> Result<(), EngineError> {
        self.drain_events(now, wall)?;
        if self.shutdown_requested {
            return Ok(());
        }
        self.maybe_refresh(now);
        self.maintain();
        self.sync_progress();
        self.admit(now);
        self.update_etas();
        Ok(())
    }

    fn drain_events(&mut self, now: Instant, wall: i64) -> Result<(), EngineError> {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event, now, wall)?;
        }
        Ok(())
    }

    fn set_controller_state(&mut self, state: ControllerState) {
        if self.controller_state != state {
            tracing::info!(from = ?self.controller_state, to = ?state, "controller state changed");
            self.controller_state = state;
        }
    }

    /// Stops admission and asks every job to stop. Follow with `poll_shutdown`.
    pub fn begin_shutdown(&mut self) {
        self.shutdown_requested = true;
        self.governor.set_paused(true);
        for job in self.jobs.values() {
            job.request_stop();
        }
        tracing::info!(jobs = self.jobs.len(), "shutting down transfers");
    }

    /// Reconciles finished jobs; true once none is left.
    pub fn poll_shutdown(&mut self) -> bool {
        if let Err(e) = self.drain_events(Instant::now(), unix_timestamp()) {
            tracing::error!("during shutdown: {}", e);
        }
        self.sync_progress();
        self.jobs.is_empty()
    }

    /// Blocking shutdown: stops all jobs and waits (polling every 100ms) up
    /// to `timeout` for them to exit. Returns false on timeout.
    pub fn shutdown(&mut self, timeout: Duration) -> bool {
        self.begin_shutdown();
        let deadline = Instant::now() + timeout;
        loop {
            if self.poll_shutdown() {
                return self
                    .governor
                    .wait_idle(deadline.saturating_duration_since(Instant::now()));
            }
            if Instant::now() >= deadline {
                tracing::warn!(jobs = self.jobs.len(), "shutdown timed out");
                return false;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
    }
}
