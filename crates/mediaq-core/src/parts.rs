//! Byte-range parts of an item and part planning.

use serde::{Deserialize, Serialize};

/// One contiguous byte range `[offset, offset + length)` of an item plus the
/// number of bytes already written from its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub offset: u64,
    pub length: u64,
    /// Bytes of this part already on disk; `0 <= loaded <= length`.
    pub loaded: u64,
}

impl Part {
    pub fn new(offset: u64, length: u64) -> Self {
        Self {
            offset,
            length,
            loaded: 0,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.length.saturating_sub(self.loaded)
    }

    pub fn is_complete(&self) -> bool {
        self.loaded >= self.length
    }

    /// Absolute file offset of the next byte to fetch.
    pub fn resume_offset(&self) -> u64 {
        self.offset + self.loaded
    }

    /// Inclusive end offset of this part. Only meaningful when `length > 0`.
    pub fn last_byte(&self) -> u64 {
        (self.offset + self.length).saturating_sub(1)
    }

    /// curl `CURLOPT_RANGE` value for the unfetched remainder: `start-end` (inclusive).
    pub fn curl_range(&self) -> String {
        format!("{}-{}", self.resume_offset(), self.last_byte())
    }

    /// HTTP Range header value for the unfetched remainder: `bytes=start-end`.
    pub fn range_header_value(&self) -> String {
        format!("bytes={}", self.curl_range())
    }

    /// Raise `loaded` to `loaded` (clamped to `length`). Never lowers it.
    pub fn advance_to(&mut self, loaded: u64) {
        let clamped = loaded.min(self.length);
        if clamped > self.loaded {
            self.loaded = clamped;
        }
    }
}

/// Splits `total` bytes into `count` parts of `total / count` bytes; the last
/// part absorbs the remainder.
///
/// `count` is clamped to `total` so no part is empty. Returns an empty vec if
/// `total` or `count` is 0.
pub fn plan_parts(total: u64, count: usize) -> Vec<Part> {
    if total == 0 || count == 0 {
        return Vec::new();
    }
    let count = (count as u64).min(total);
    let size = total / count;

    let mut out = Vec::with_capacity(count as usize);
    for i in 0..count {
        let offset = i * size;
        let length = if i + 1 == count { total - offset } else { size };
        out.push(Part::new(offset, length));
    }
    out
}

/// Sum of `loaded` over all parts.
pub fn loaded_bytes(parts: &[Part]) -> u64 {
    parts.iter().map(|p| p.loaded).sum()
}
