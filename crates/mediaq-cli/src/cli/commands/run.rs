//! `mediaq run` – the download daemon.

use anyhow::Result;
use mediaq_core::catalog::{CatalogApi, HttpCatalog};
use mediaq_core::config::MediaqConfig;
use mediaq_core::control::ControlRequest;
use mediaq_core::probe::CurlProbe;
use mediaq_core::scheduler::{self, RunOptions, Scheduler};
use mediaq_core::store::QueueDb;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::control_socket;

pub async fn run_daemon(cfg: MediaqConfig, config_path: PathBuf, socket_path: PathBuf) -> Result<()> {
    let db = QueueDb::open_default().await?;
    let state = db.load().await?;
    tracing::info!(
        items = state.items.len(),
        recordings = state.recordings.len(),
        "queue loaded"
    );

    let catalog: Option<Arc<dyn CatalogApi>> = cfg.catalog.base_url.as_deref().map(|url| {
        Arc::new(HttpCatalog::new(url, cfg.user_agent.clone(), cfg.connect_timeout()))
            as Arc<dyn CatalogApi>
    });
    let probe = Arc::new(CurlProbe::new(cfg.user_agent.clone(), cfg.connect_timeout()));
    let scheduler = Scheduler::new(cfg, state, catalog, probe);

    let (handle, commands) = scheduler::channel(32);
    let listener = control_socket::spawn_control_listener(handle.clone(), &socket_path)?;
    let signals = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            let _ = handle.call(ControlRequest::Shutdown).await;
        }
    });
    println!("mediaq running; control socket at {}", socket_path.display());

    let result = scheduler::run(
        scheduler,
        db,
        commands,
        RunOptions {
            config_path: Some(config_path),
            ..RunOptions::default()
        },
    )
    .await;

    listener.abort();
    signals.abort();
    let _ = std::fs::remove_file(&socket_path);
    result
}
