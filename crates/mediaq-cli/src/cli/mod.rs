//! CLI for the mediaq download queue: `run` starts the daemon, every other
//! command talks to it over the control socket.

mod commands;
mod control_socket;

use anyhow::Result;
use clap::{ArgGroup, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use mediaq_core::config;
use mediaq_core::control::{self, ControlRequest};
use mediaq_core::queue::{Quality, Reorder};
use std::path::PathBuf;

use commands::{print_response, run_daemon};

/// Top-level CLI for the mediaq download queue.
#[derive(Debug, Parser)]
#[command(name = "mediaq")]
#[command(about = "mediaq: prioritized, throttled download queue for recorded media", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/mediaq/config.toml).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Control socket (default: ~/.local/state/mediaq/control.sock).
    #[arg(long, global = true, value_name = "PATH")]
    pub socket: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the download daemon until `mediaq shutdown` or Ctrl-C.
    Run {
        /// Root directory for downloaded files (overrides the config).
        #[arg(long, value_name = "DIR")]
        download_dir: Option<PathBuf>,
    },

    /// Show engine status.
    Status,

    /// List queue items in priority order.
    Items,

    /// List recordings known from the catalog.
    Recordings,

    /// Queue a recording in the given quality (HD, HQ, NQ).
    Enqueue {
        recording_id: i64,
        quality: Quality,
    },

    /// Remove an item from the queue. Files on disk are kept.
    Remove {
        /// Item identifier.
        id: i64,
    },

    /// Change an item's priority.
    #[command(group(ArgGroup::new("change").required(true).args(["to", "up", "down"])))]
    Reorder {
        /// Item identifier.
        id: i64,
        /// Set the priority value (lower runs first).
        #[arg(long, allow_negative_numbers = true)]
        to: Option<i64>,
        /// Move one place towards the front.
        #[arg(long)]
        up: bool,
        /// Move one place towards the back.
        #[arg(long)]
        down: bool,
    },

    /// Pause all transfers.
    Pause,

    /// Resume transfers.
    Resume,

    /// Set the aggregate speed limit in bytes per second (0 = unlimited).
    Limit { bytes_per_sec: u64 },

    /// Set how many items download at once.
    Slots { n: usize },

    /// Mark a recording for deletion from the catalog once downloaded.
    MarkDeleted {
        recording_id: i64,
        /// Clear the mark instead.
        #[arg(long)]
        undo: bool,
    },

    /// Refresh the catalog now.
    Refresh,

    /// Stop the daemon after its transfers have stopped.
    Shutdown,

    /// Print shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl CliCommand {
    /// Control request for commands served by the running daemon.
    pub fn to_request(&self) -> Option<ControlRequest> {
        let request = match self {
            CliCommand::Run { .. } | CliCommand::Completions { .. } => return None,
            CliCommand::Status => ControlRequest::Status,
            CliCommand::Items => ControlRequest::Items,
            CliCommand::Recordings => ControlRequest::Recordings,
            CliCommand::Enqueue {
                recording_id,
                quality,
            } => ControlRequest::Enqueue {
                recording_id: *recording_id,
                quality: *quality,
            },
            CliCommand::Remove { id } => ControlRequest::Remove { item_id: *id },
            CliCommand::Reorder { id, to, up, down } => {
                let change = match (to, up, down) {
                    (Some(p), _, _) => Reorder::To(*p),
                    (None, true, _) => Reorder::Up,
                    (None, false, true) => Reorder::Down,
                    (None, false, false) => return None,
                };
                ControlRequest::Reorder {
                    item_id: *id,
                    change,
                }
            }
            CliCommand::Pause => ControlRequest::Pause,
            CliCommand::Resume => ControlRequest::Resume,
            CliCommand::Limit { bytes_per_sec } => ControlRequest::SetSpeedLimit {
                bytes_per_sec: *bytes_per_sec,
            },
            CliCommand::Slots { n } => ControlRequest::SetMaxConcurrent { slots: *n },
            CliCommand::MarkDeleted { recording_id, undo } => ControlRequest::MarkRecordingDeleted {
                recording_id: *recording_id,
                marked: !undo,
            },
            CliCommand::Refresh => ControlRequest::Refresh,
            CliCommand::Shutdown => ControlRequest::Shutdown,
        };
        Some(request)
    }

    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let socket_path = match cli.socket {
            Some(p) => p,
            None => control::default_control_socket_path()?,
        };

        match cli.command {
            CliCommand::Completions { shell } => {
                clap_complete::generate(shell, &mut Cli::command(), "mediaq", &mut std::io::stdout());
            }
            CliCommand::Run { download_dir } => {
                let config_path = match cli.config {
                    Some(p) => p,
                    None => config::config_path()?,
                };
                let mut cfg = config::load_or_init_at(&config_path)?;
                tracing::debug!("loaded config: {:?}", cfg);
                if download_dir.is_some() {
                    cfg.download_dir = download_dir;
                }
                run_daemon(cfg, config_path, socket_path).await?;
            }
            command => {
                let Some(request) = command.to_request() else {
                    anyhow::bail!("nothing to send for {:?}", command);
                };
                let response = control_socket::send_request(&socket_path, &request).await?;
                print_response(&request, response)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
