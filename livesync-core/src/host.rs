//! Wire types for the host-process channel.
//!
//! Newline-delimited JSON over a Unix socket. A connection sends one request
//! per line and reads one [`HostResponse`] per line. After a successful
//! `subscribe`, the connection carries [`HostEvent`] lines instead.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum HostRequest {
    /// Current archive as base64.
    GetInitialArchive,
    /// Editor-side save; `archive` is base64. `session` is the id from the
    /// sender's own `subscribe` ack, so the save is not echoed back to it.
    SaveArchive {
        archive: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session: Option<u64>,
    },
    /// Turn this connection into an event stream. The ack carries
    /// `{"subscribed": true, "session": <id>}`.
    Subscribe,
    Status,
    /// Replace the workspace with an archive file and push it everywhere.
    Import { path: PathBuf },
    /// Rebuild from the workspace and write the archive to a file.
    Export { path: PathBuf },
    Stop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HostResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Unwrap into the payload or the error message.
    pub fn into_result(self) -> Result<Value, String> {
        if self.ok {
            Ok(self.data.unwrap_or(Value::Null))
        } else {
            Err(self.error.unwrap_or_else(|| "unknown host error".to_string()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    ArchiveUpdated { payload: String },
}
