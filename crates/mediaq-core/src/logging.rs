//! Logging init for the daemon and the control client.
//!
//! The daemon logs to `~/.local/state/mediaq/mediaq.log`; when that file
//! cannot be opened the binary falls back to stderr. `RUST_LOG` overrides the
//! default filter in both cases.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,mediaq=debug,mediaq_core=debug";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Path of the daemon log: `~/.local/state/mediaq/mediaq.log`.
pub fn log_file_path() -> Result<PathBuf> {
    Ok(crate::config::state_dir()?.join("mediaq.log"))
}

/// Installs a subscriber appending to the log file. Returns Err (nothing
/// installed) if the state directory or file is not writable.
pub fn init_logging() -> Result<()> {
    let path = log_file_path()?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("install subscriber: {}", e))?;

    tracing::info!("mediaq logging to {}", path.display());
    Ok(())
}

/// Stderr-only logging for when `init_logging` fails.
pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .try_init();
}
