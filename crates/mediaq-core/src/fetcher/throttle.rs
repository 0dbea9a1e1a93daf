//! Per-transfer throttle and speed sampling.

use std::time::{Duration, Instant};

/// Bytes between two throttle checks (20 reads of 2 KiB).
pub const CHECK_BLOCK_BYTES: u64 = 20 * 2048;

/// Minimum interval between two speed reports to the governor.
pub const REPORT_INTERVAL: Duration = Duration::from_millis(300);

#[derive(Debug, Clone)]
pub struct Throttle {
    block_start: Instant,
    block_bytes: u64,
    report_start: Instant,
    report_bytes: u64,
}

impl Throttle {
    pub fn new(now: Instant) -> Self {
        Self {
            block_start: now,
            block_bytes: 0,
            report_start: now,
            report_bytes: 0,
        }
    }

    /// Accounts `n` received bytes. Once a check block is full, returns how
    /// long to sleep so the block took at least `block_bytes / allowance`.
    pub fn record(&mut self, n: u64, allowance: Option<u64>, now: Instant) -> Option<Duration> {
        self.block_bytes += n;
        self.report_bytes += n;
        if self.block_bytes < CHECK_BLOCK_BYTES {
            return None;
        }
        let elapsed = now.saturating_duration_since(self.block_start);
        let delay = allowance.filter(|a| *a > 0).and_then(|a| {
            let wanted = Duration::from_secs_f64(self.block_bytes as f64 / a as f64);
            wanted.checked_sub(elapsed).filter(|d| !d.is_zero())
        });
        self.block_bytes = 0;
        self.block_start = now + delay.unwrap_or_default();
        delay
    }

    /// Bytes/sec since the last sample, once `REPORT_INTERVAL` has passed.
    pub fn speed_sample(&mut self, now: Instant) -> Option<f64> {
        let elapsed = now.saturating_duration_since(self.report_start);
        if elapsed < REPORT_INTERVAL {
            return None;
        }
        let speed = self.report_bytes as f64 / elapsed.as_secs_f64();
        self.report_start = now;
        self.report_bytes = 0;
        Some(speed)
    }
}
