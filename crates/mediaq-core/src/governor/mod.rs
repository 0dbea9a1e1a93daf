//! Rate governor: fair bandwidth sharing across all running range transfers.
//!
//! Every connected range fetch registers as one active transfer. With a
//! ceiling `C` and `n` active transfers the published per-slot allowance is
//! `C / n`. Fetchers report their measured speed; the governor keeps a bounded
//! running mean of per-transfer speed (at most `n * SAMPLES_PER_TRANSFER`
//! samples, so fewer transfers adapt faster) and publishes the aggregate as
//! `mean * n`.

mod eta;

pub use eta::{estimate_etas, pack_lanes, EtaInput, LanePacking};

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Samples per active transfer kept in the running mean.
pub const SAMPLES_PER_TRANSFER: u64 = 200;

/// Poll period of `wait_idle`.
const IDLE_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct RateState {
    active: usize,
    ceiling: u64,
    /// Running mean of reported per-transfer speed, bytes/sec.
    mean: f64,
    samples: u64,
}

impl RateState {
    fn allowance(&self) -> Option<u64> {
        if self.ceiling == 0 || self.active == 0 {
            None
        } else {
            Some(self.ceiling / self.active as u64)
        }
    }

    fn aggregate(&self) -> f64 {
        self.mean * self.active as f64
    }
}

/// Point-in-time view of the governor for status output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub active_transfers: usize,
    /// Configured ceiling in bytes/sec; 0 = unlimited.
    pub ceiling: u64,
    /// Current per-transfer allowance in bytes/sec; None = unlimited.
    pub per_slot_allowance: Option<u64>,
    /// Measured aggregate speed in bytes/sec.
    pub aggregate_speed: f64,
    pub paused: bool,
}

/// Shared rate state. Wrap in `Arc`; fetchers hold a clone.
#[derive(Debug, Default)]
pub struct RateGovernor {
    state: Mutex<RateState>,
    paused: AtomicBool,
}

impl RateGovernor {
    pub fn new(ceiling: u64) -> Self {
        let g = Self::default();
        g.set_ceiling(ceiling);
        g
    }

    fn lock(&self) -> MutexGuard<'_, RateState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers one connected transfer. The returned guard unregisters on drop.
    pub fn register_transfer(self: &Arc<Self>) -> TransferGuard {
        {
            let mut s = self.lock();
            s.active += 1;
            tracing::trace!(active = s.active, allowance = ?s.allowance(), "transfer registered");
        }
        TransferGuard {
            governor: Arc::clone(self),
        }
    }

    fn transfer_finished(&self) {
        let mut s = self.lock();
        s.active = s.active.saturating_sub(1);
        if s.active == 0 {
            s.mean = 0.0;
            s.samples = 0;
        }
        tracing::trace!(active = s.active, allowance = ?s.allowance(), "transfer finished");
    }

    /// Sets the aggregate ceiling (0 = unlimited). The measured mean restarts
    /// optimistically at the new ceiling.
    pub fn set_ceiling(&self, ceiling: u64) {
        let mut s = self.lock();
        s.ceiling = ceiling;
        s.mean = ceiling as f64 / s.active.max(1) as f64;
        s.samples = 0;
    }

    pub fn ceiling(&self) -> u64 {
        self.lock().ceiling
    }

    /// Bytes/sec each transfer may use; None = unlimited.
    pub fn per_slot_allowance(&self) -> Option<u64> {
        self.lock().allowance()
    }

    /// Adds one per-transfer speed sample (bytes/sec).
    pub fn report_speed(&self, bytes_per_sec: f64) {
        if !bytes_per_sec.is_finite() || bytes_per_sec < 0.0 {
            return;
        }
        let mut s = self.lock();
        let cap = (s.active.max(1) as u64) * SAMPLES_PER_TRANSFER;
        let n = s.samples.min(cap);
        s.mean = (s.mean * n as f64 + bytes_per_sec) / (n + 1) as f64;
        s.samples = (n + 1).min(cap);
    }

    /// Measured aggregate throughput across all active transfers, bytes/sec.
    pub fn aggregate_speed(&self) -> f64 {
        self.lock().aggregate()
    }

    pub fn active_transfers(&self) -> usize {
        self.lock().active
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    /// Blocks until no transfer is active, polling every 100ms. Returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.active_transfers() == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(IDLE_POLL);
        }
    }

    pub fn snapshot(&self) -> RateSnapshot {
        let s = self.lock();
        RateSnapshot {
            active_transfers: s.active,
            ceiling: s.ceiling,
            per_slot_allowance: s.allowance(),
            aggregate_speed: s.aggregate(),
            paused: self.is_paused(),
        }
    }
}

/// Keeps one transfer registered with the governor while alive.
#[derive(Debug)]
pub struct TransferGuard {
    governor: Arc<RateGovernor>,
}

impl TransferGuard {
    pub fn governor(&self) -> &RateGovernor {
        &self.governor
    }
}

impl Drop for TransferGuard {
    fn drop(&mut self) {
        self.governor.transfer_finished();
    }
}
