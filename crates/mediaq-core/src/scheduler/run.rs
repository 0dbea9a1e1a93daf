//! Async driver: ticks, control commands, persistence, shutdown.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use super::Scheduler;
use crate::config;
use crate::control::{ControlRequest, ControlResponse};
use crate::store::QueueDb;

const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// A control request with its reply channel.
#[derive(Debug)]
pub struct Command {
    pub request: ControlRequest,
    pub reply: oneshot::Sender<ControlResponse>,
}

/// Cloneable sender side used by the control socket and signal handlers.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<Command>,
}

impl SchedulerHandle {
    pub async fn call(&self, request: ControlRequest) -> Result<ControlResponse> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command { request, reply })
            .await
            .map_err(|_| anyhow::anyhow!("scheduler is not running"))?;
        rx.await.context("scheduler dropped the request")
    }
}

pub fn channel(buffer: usize) -> (SchedulerHandle, mpsc::Receiver<Command>) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (SchedulerHandle { tx }, rx)
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Where runtime setting changes are written back; None = not persisted.
    pub config_path: Option<PathBuf>,
    /// How long shutdown waits for transfers to stop.
    pub shutdown_timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            config_path: None,
            shutdown_timeout: Duration::from_secs(15),
        }
    }
}

/// Drives `scheduler` until a shutdown request, until every handle is
/// dropped, or until an invariant fails. The queue is saved on exit.
pub async fn run(
    mut scheduler: Scheduler,
    db: QueueDb,
    mut commands: mpsc::Receiver<Command>,
    opts: RunOptions,
) -> Result<()> {
    let mut interval = tokio::time::interval(scheduler.config().tick_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let save_interval = scheduler.config().save_interval();
    let mut last_save = Instant::now();

    tracing::info!(
        items = scheduler.state().items.len(),
        slots = scheduler.config().max_concurrent_downloads,
        "scheduler started"
    );

    let outcome = loop {
        let mut tick = false;
        tokio::select! {
            _ = interval.tick() => tick = true,
            cmd = commands.recv() => match cmd {
                Some(Command { request, reply }) => {
                    let response = scheduler.dispatch(request);
                    let _ = reply.send(response);
                    tick = scheduler.take_force_tick();
                }
                None => {
                    tracing::info!("all control handles closed");
                    break Ok(());
                }
            },
        }

        if scheduler.shutdown_requested() {
            break Ok(());
        }
        if tick {
            if let Err(e) = scheduler.tick() {
                tracing::error!("{}", e);
                break Err(anyhow::Error::new(e));
            }
        }

        if scheduler.take_dirty() || last_save.elapsed() >= save_interval {
            if let Err(e) = db.save(scheduler.state()).await {
                tracing::error!("saving queue failed: {:#}", e);
            }
            last_save = Instant::now();
        }
        write_config_if_changed(&mut scheduler, &opts);
    };

    scheduler.begin_shutdown();
    let deadline = Instant::now() + opts.shutdown_timeout;
    while !scheduler.poll_shutdown() {
        if Instant::now() >= deadline {
            tracing::warn!("transfers did not stop in time");
            break;
        }
        tokio::time::sleep(SHUTDOWN_POLL).await;
    }
    db.save(scheduler.state()).await?;
    write_config_if_changed(&mut scheduler, &opts);
    tracing::info!("scheduler stopped");
    outcome
}

fn write_config_if_changed(scheduler: &mut Scheduler, opts: &RunOptions) {
    if !scheduler.take_config_dirty() {
        return;
    }
    if let Some(path) = &opts.config_path {
        if let Err(e) = config::save_at(path, scheduler.config()) {
            tracing::error!("saving config failed: {:#}", e);
        }
    }
}
