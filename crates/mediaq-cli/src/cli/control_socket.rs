//! Control socket: server (during `mediaq run`) and client (every other command).
//! Protocol: one JSON `ControlRequest` per line, answered by one JSON `ControlResponse` line.

use anyhow::{Context, Result};
use mediaq_core::control::{ControlRequest, ControlResponse};
use mediaq_core::scheduler::SchedulerHandle;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Binds `path` (replacing a stale socket) and serves requests through `handle`
/// until the returned task is aborted.
pub fn spawn_control_listener(
    handle: SchedulerHandle,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)
        .with_context(|| format!("bind control socket {}", path.display()))?;
    tracing::debug!(path = %path.display(), "control socket listening");

    Ok(tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let handle = handle.clone();
                    tokio::spawn(serve_connection(stream, handle));
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    }))
}

async fn serve_connection(stream: UnixStream, handle: SchedulerHandle) {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<ControlRequest>(line) {
            Ok(request) => handle
                .call(request)
                .await
                .unwrap_or_else(|e| ControlResponse::error(format!("{:#}", e))),
            Err(e) => ControlResponse::error(format!("bad request: {}", e)),
        };
        let mut out = match serde_json::to_string(&response) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("control response: {}", e);
                return;
            }
        };
        out.push('\n');
        if write.write_all(out.as_bytes()).await.is_err() {
            return;
        }
    }
}

/// Sends one request to the daemon and waits for its response.
pub async fn send_request(socket_path: &Path, request: &ControlRequest) -> Result<ControlResponse> {
    let stream = UnixStream::connect(socket_path).await.with_context(|| {
        format!(
            "connect to {} (is `mediaq run` running?)",
            socket_path.display()
        )
    })?;
    let (read, mut write) = stream.into_split();
    let mut line = serde_json::to_string(request)?;
    line.push('\n');
    write.write_all(line.as_bytes()).await?;

    let mut reply = String::new();
    BufReader::new(read).read_line(&mut reply).await?;
    if reply.trim().is_empty() {
        anyhow::bail!("daemon closed the connection without a response");
    }
    Ok(serde_json::from_str(reply.trim())?)
}
