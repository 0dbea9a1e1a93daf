//! CLI command handlers.

mod items;
mod recordings;
mod run;
mod status;

pub use run::run_daemon;

use anyhow::{Context, Result};
use mediaq_core::control::{ControlRequest, ControlResponse};
use mediaq_core::scheduler::{ItemStatus, RecordingStatus, StatusSnapshot};

/// Prints a daemon response in human-readable form; an error response becomes `Err`.
pub fn print_response(request: &ControlRequest, response: ControlResponse) -> Result<()> {
    if !response.ok {
        anyhow::bail!(
            "{}",
            response.error.unwrap_or_else(|| "request failed".to_string())
        );
    }
    let result = response.result.unwrap_or(serde_json::Value::Null);
    match request {
        ControlRequest::Status => {
            let snapshot: StatusSnapshot =
                serde_json::from_value(result).context("decode status")?;
            status::print_status(&snapshot);
        }
        ControlRequest::Items => {
            let items: Vec<ItemStatus> = serde_json::from_value(result).context("decode items")?;
            items::print_items(&items);
        }
        ControlRequest::Recordings => {
            let recordings: Vec<RecordingStatus> =
                serde_json::from_value(result).context("decode recordings")?;
            recordings::print_recordings(&recordings);
        }
        ControlRequest::Enqueue { .. } => match result.get("item_id") {
            Some(id) => println!("Queued as item {}", id),
            None => println!("Queued"),
        },
        ControlRequest::Shutdown => println!("Daemon is shutting down"),
        _ => println!("OK"),
    }
    Ok(())
}

/// `1.5 MiB` style size.
pub(crate) fn format_bytes(n: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// `1h02m03s` style duration.
pub(crate) fn format_eta(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h{:02}m{:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m{:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_and_eta_formatting() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MiB");
        assert_eq!(format_eta(59), "59s");
        assert_eq!(format_eta(61), "1m01s");
        assert_eq!(format_eta(3723), "1h02m03s");
    }

    #[test]
    fn error_response_is_err() {
        let err = print_response(&ControlRequest::Pause, ControlResponse::error("no item with id 3"))
            .unwrap_err();
        assert_eq!(err.to_string(), "no item with id 3");
    }
}
