use std::time::Duration;

/// Classification of a fetch error for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation timed out (connect/read).
    Timeout,
    /// Server asked us to slow down (429, 503).
    Throttled,
    /// Network-level failure (connection reset, DNS, truncated body).
    Connection,
    /// Server error other than throttling.
    Http5xx(u16),
    /// Local write to the temp file failed.
    Storage,
    /// Stop was requested.
    Stopped,
    /// Anything else, including unexpected HTTP statuses.
    Other,
}

impl ErrorKind {
    /// Short label used in `last_error` and log fields.
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::Throttled => "server busy",
            ErrorKind::Connection => "connection lost",
            ErrorKind::Http5xx(_) => "server error",
            ErrorKind::Storage => "storage",
            ErrorKind::Stopped => "stopped",
            ErrorKind::Other => "unexpected response",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    NoRetry,
    RetryAfter(Duration),
}

/// A server that asked us to slow down waits this many times the base delay.
pub const THROTTLED_FACTOR: u32 = 2;

/// Fixed-delay policy: every network-side error is retried after `delay`
/// (`THROTTLED_FACTOR * delay` for 429/503), without an attempt limit.
/// Admission, not a counter, bounds the work.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn decide(&self, kind: ErrorKind) -> RetryDecision {
        match kind {
            ErrorKind::Storage | ErrorKind::Stopped => RetryDecision::NoRetry,
            ErrorKind::Throttled => {
                RetryDecision::RetryAfter(self.delay.saturating_mul(THROTTLED_FACTOR))
            }
            ErrorKind::Timeout
            | ErrorKind::Connection
            | ErrorKind::Http5xx(_)
            | ErrorKind::Other => RetryDecision::RetryAfter(self.delay),
        }
    }
}
