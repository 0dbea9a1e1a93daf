//! Completion-time estimation by greedy lane packing.
//!
//! Remaining work is spread over `slots` virtual lanes. Items already
//! downloading claim lanes first; pending items are then assigned, in priority
//! order, to the lane with the least remaining bytes. An item finishes when its
//! lane has drained everything up to and including it, at `aggregate / slots`
//! bytes per second per lane.

/// Per-item input, given in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EtaInput {
    /// Bytes still to fetch; None if the size is not known yet.
    pub remaining: Option<u64>,
    pub downloading: bool,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanePacking {
    /// Final remaining bytes per lane.
    pub lanes: Vec<u64>,
    /// For each input item, the lane load at the moment it was placed
    /// (bytes to drain before it is done); None if it was not packed.
    pub finish_bytes: Vec<Option<u64>>,
}

fn least_loaded(lanes: &[u64]) -> usize {
    let mut best = 0;
    for (i, load) in lanes.iter().enumerate() {
        if *load < lanes[best] {
            best = i;
        }
    }
    best
}

pub fn pack_lanes(items: &[EtaInput], slots: usize) -> LanePacking {
    let mut lanes = vec![0u64; slots];
    let mut finish_bytes = vec![None; items.len()];
    if slots == 0 {
        return LanePacking {
            lanes,
            finish_bytes,
        };
    }

    let mut place = |idx: usize, bytes: u64, lanes: &mut Vec<u64>| {
        let lane = least_loaded(lanes);
        lanes[lane] += bytes;
        finish_bytes[idx] = Some(lanes[lane]);
    };

    for (i, item) in items.iter().enumerate() {
        if item.completed || !item.downloading {
            continue;
        }
        if let Some(rem) = item.remaining {
            place(i, rem, &mut lanes);
        }
    }
    for (i, item) in items.iter().enumerate() {
        if item.completed || item.downloading {
            continue;
        }
        if let Some(rem) = item.remaining {
            place(i, rem, &mut lanes);
        }
    }

    LanePacking {
        lanes,
        finish_bytes,
    }
}

/// Seconds to completion per item (rounded up). None for completed items,
/// unknown sizes, zero slots or zero measured speed.
pub fn estimate_etas(items: &[EtaInput], slots: usize, aggregate_speed: f64) -> Vec<Option<u64>> {
    let packing = pack_lanes(items, slots);
    if slots == 0 || !(aggregate_speed > 0.0) {
        return vec![None; items.len()];
    }
    let lane_speed = aggregate_speed / slots as f64;
    packing
        .finish_bytes
        .iter()
        .map(|b| b.map(|bytes| (bytes as f64 / lane_speed).ceil() as u64))
        .collect()
}
