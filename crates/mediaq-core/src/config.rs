use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::{AutodownloadLevel, Credentials};
use crate::url_model::DEFAULT_FILE_NAME_PATTERN;

/// Longest accepted part retry delay; larger or non-finite values are clamped.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(3600);

/// Part retry parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Fixed delay in seconds before a failed part reconnects (e.g. 5.0).
    pub delay_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { delay_secs: 5.0 }
    }
}

/// Upstream catalog endpoint and credentials (optional section in config.toml).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Base URL of the catalog API (e.g. `https://recorder.example/api`).
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl CatalogConfig {
    /// Credentials if both username and password are set and non-empty.
    pub fn credentials(&self) -> Option<Credentials> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some(Credentials {
                username: u.to_string(),
                password: p.to_string(),
            }),
            _ => None,
        }
    }
}

/// Global configuration loaded from `~/.config/mediaq/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaqConfig {
    /// Maximum number of items transferring at once (slots).
    pub max_concurrent_downloads: usize,
    /// Number of byte ranges an item is split into when it starts from scratch.
    pub parts_per_item: usize,
    /// Optional aggregate bandwidth ceiling in bytes per second (None or 0 = unlimited).
    #[serde(default)]
    pub max_bytes_per_sec: Option<u64>,
    /// Global pause: no item is admitted while set.
    #[serde(default)]
    pub paused: bool,
    /// Root directory for target files. None = working directory of the daemon.
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Target path under `download_dir`, `/` separates subdirectories.
    /// Placeholders: `{title}`, `{quality}`, `{date}`, `{id}`, `{ext}`.
    #[serde(default = "default_file_name_pattern")]
    pub file_name_pattern: String,
    /// Scheduling tick period in milliseconds.
    pub tick_interval_ms: u64,
    /// How often the recording catalog is refreshed, in seconds.
    pub catalog_refresh_secs: u64,
    /// Upper bound between two queue saves even when nothing changed, in seconds.
    pub save_interval_secs: u64,
    /// Which quality variants are enqueued automatically after a catalog refresh.
    #[serde(default)]
    pub autodownload: AutodownloadLevel,
    /// Mark recordings for upstream deletion after auto-enqueueing them.
    #[serde(default)]
    pub delete_after_download: bool,
    /// Minimum age (since first seen) before a marked recording is deleted upstream, in seconds.
    pub delete_grace_period_secs: u64,
    /// HTTP connect timeout in seconds (probe, parts, catalog).
    pub connect_timeout_secs: u64,
    /// User-Agent sent with every request.
    pub user_agent: String,
    /// Optional retry section; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

fn default_file_name_pattern() -> String {
    DEFAULT_FILE_NAME_PATTERN.to_string()
}

impl Default for MediaqConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 2,
            parts_per_item: 4,
            max_bytes_per_sec: None,
            paused: false,
            download_dir: None,
            file_name_pattern: default_file_name_pattern(),
            tick_interval_ms: 500,
            catalog_refresh_secs: 600,
            save_interval_secs: 10,
            autodownload: AutodownloadLevel::None,
            delete_after_download: false,
            delete_grace_period_secs: 86_400,
            connect_timeout_secs: 10,
            user_agent: format!("mediaq/{}", env!("CARGO_PKG_VERSION")),
            retry: None,
            catalog: CatalogConfig::default(),
        }
    }
}

impl MediaqConfig {
    /// Ceiling in bytes per second; 0 means unlimited.
    pub fn ceiling(&self) -> u64 {
        self.max_bytes_per_sec.unwrap_or(0)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(10))
    }

    pub fn catalog_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.catalog_refresh_secs)
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save_interval_secs.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }

    pub fn retry_delay(&self) -> Duration {
        let secs = self
            .retry
            .as_ref()
            .map(|r| r.delay_secs)
            .unwrap_or_else(|| RetryConfig::default().delay_secs);
        if secs.is_nan() || secs <= 0.0 {
            return Duration::ZERO;
        }
        if secs >= MAX_RETRY_DELAY.as_secs_f64() {
            return MAX_RETRY_DELAY;
        }
        Duration::from_secs_f64(secs)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mediaq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// `~/.local/state/mediaq`: queue database, log file and control socket.
pub fn state_dir() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mediaq")?;
    Ok(xdg_dirs.get_state_home().join("mediaq"))
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<MediaqConfig> {
    let path = config_path()?;
    load_or_init_at(&path)
}

/// Like `load_or_init` but for an explicit path (tests, `--config`).
pub fn load_or_init_at(path: &Path) -> Result<MediaqConfig> {
    if !path.exists() {
        let default_cfg = MediaqConfig::default();
        save_at(path, &default_cfg)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: MediaqConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}

/// Write `cfg` to `path`, creating the parent directory. Used when runtime
/// settings (pause, ceiling, slots) change through the control surface.
pub fn save_at(path: &Path, cfg: &MediaqConfig) -> Result<()> {
    let toml = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, toml).with_context(|| format!("write config: {}", path.display()))?;
    Ok(())
}
