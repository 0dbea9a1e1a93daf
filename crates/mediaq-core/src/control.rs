//! Remote control protocol: one JSON request per line, one JSON response per line.
//!
//! Requests are tagged by `op`, e.g. `{"op":"set_speed_limit","bytes_per_sec":500000}`.
//! Every response is `{"ok":true,"result":...}` or `{"ok":false,"error":"..."}`.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::queue::{ItemId, Quality, RecordingId, Reorder};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ControlRequest {
    /// Engine status snapshot.
    Status,
    /// All queue items with progress and ETA.
    Items,
    /// The cached recording catalog.
    Recordings,
    Enqueue {
        recording_id: RecordingId,
        quality: Quality,
    },
    Remove {
        item_id: ItemId,
    },
    Reorder {
        item_id: ItemId,
        change: Reorder,
    },
    Pause,
    Resume,
    /// Aggregate ceiling in bytes/sec; 0 = unlimited.
    SetSpeedLimit {
        bytes_per_sec: u64,
    },
    SetMaxConcurrent {
        slots: usize,
    },
    MarkRecordingDeleted {
        recording_id: RecordingId,
        marked: bool,
    },
    /// Refresh the catalog on the next tick.
    Refresh,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl ControlResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
            result: None,
        }
    }

    pub fn with_result<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => Self {
                ok: true,
                error: None,
                result: Some(v),
            },
            Err(e) => Self::error(format!("serialize result: {}", e)),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
            result: None,
        }
    }
}

/// Default path for the control socket: `~/.local/state/mediaq/control.sock`.
pub fn default_control_socket_path() -> Result<PathBuf> {
    Ok(crate::config::state_dir()?.join("control.sock"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_wire_format() {
        let r: ControlRequest =
            serde_json::from_str(r#"{"op":"enqueue","recording_id":7,"quality":"HD"}"#).unwrap();
        assert_eq!(
            r,
            ControlRequest::Enqueue {
                recording_id: 7,
                quality: Quality::Hd
            }
        );
        let r: ControlRequest =
            serde_json::from_str(r#"{"op":"reorder","item_id":3,"change":{"to":1}}"#).unwrap();
        assert_eq!(
            r,
            ControlRequest::Reorder {
                item_id: 3,
                change: Reorder::To(1)
            }
        );
        let r: ControlRequest =
            serde_json::from_str(r#"{"op":"reorder","item_id":3,"change":"up"}"#).unwrap();
        assert_eq!(
            r,
            ControlRequest::Reorder {
                item_id: 3,
                change: Reorder::Up
            }
        );
        assert_eq!(
            serde_json::to_string(&ControlRequest::Pause).unwrap(),
            r#"{"op":"pause"}"#
        );
    }

    #[test]
    fn response_omits_empty_fields() {
        assert_eq!(serde_json::to_string(&ControlResponse::ok()).unwrap(), r#"{"ok":true}"#);
        assert_eq!(
            serde_json::to_string(&ControlResponse::error("no such item: 4")).unwrap(),
            r#"{"ok":false,"error":"no such item: 4"}"#
        );
        let r = ControlResponse::with_result(&vec![1, 2]);
        assert_eq!(r.result, Some(serde_json::json!([1, 2])));
    }
}
