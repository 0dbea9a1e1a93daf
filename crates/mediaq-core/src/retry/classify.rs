//! Classify HTTP status, curl and fetch errors into retry kinds.

use super::error::FetchError;
use super::policy::ErrorKind;

/// Classify an HTTP status code.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code as u16),
        _ => ErrorKind::Other,
    }
}

/// Classify a curl error.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        return ErrorKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return ErrorKind::Connection;
    }
    ErrorKind::Other
}

pub fn classify(e: &FetchError) -> ErrorKind {
    match e {
        FetchError::Curl(ce) => classify_curl_error(ce),
        FetchError::Multi(_) => ErrorKind::Connection,
        FetchError::Http(code) => classify_http_status(*code),
        FetchError::Storage(_) => ErrorKind::Storage,
        FetchError::ShortBody { .. } => ErrorKind::Connection,
        FetchError::Stopped => ErrorKind::Stopped,
    }
}
