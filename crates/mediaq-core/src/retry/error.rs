//! Range fetch error type.

use std::fmt;
use std::io;

/// Error returned by one attempt of a range fetch.
#[derive(Debug)]
pub enum FetchError {
    /// Curl reported an error (timeout, connection reset, DNS, ...).
    Curl(curl::Error),
    /// The multi handle driving the transfer failed.
    Multi(curl::MultiError),
    /// The server answered with something other than 206 Partial Content.
    Http(u32),
    /// Writing received bytes to the temp file failed.
    Storage(io::Error),
    /// The transfer ended before the requested range was complete.
    ShortBody { expected: u64, received: u64 },
    /// The fetch was asked to stop.
    Stopped,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Curl(e) => write!(f, "{}", e),
            FetchError::Multi(e) => write!(f, "curl multi: {}", e),
            FetchError::Http(code) => write!(f, "HTTP {} (expected 206 Partial Content)", code),
            FetchError::Storage(e) => write!(f, "storage: {}", e),
            FetchError::ShortBody { expected, received } => {
                write!(f, "connection closed after {} of {} bytes", received, expected)
            }
            FetchError::Stopped => write!(f, "stopped"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Curl(e) => Some(e),
            FetchError::Multi(e) => Some(e),
            FetchError::Storage(e) => Some(e),
            _ => None,
        }
    }
}
