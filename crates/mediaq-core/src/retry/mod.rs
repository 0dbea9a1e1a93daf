//! Error classification and fixed-delay retry for range fetches.
//!
//! Transient network faults are retried in place, indefinitely, with a fixed
//! delay; progress already written is kept. Local storage faults and explicit
//! stops end the fetch.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::FetchError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::{run_with_retry, sleep_unless_stopped, STOP_POLL};
