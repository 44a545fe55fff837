use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The editor refused a decoded payload.
    #[error("editor rejected project: {0}")]
    LoadRejected(String),

    /// The selected sub-target does not exist in the loaded document.
    #[error("target not found: {0}")]
    TargetNotFound(String),

    #[error("transport closed")]
    TransportClosed,

    #[error("save failed: {0}")]
    SaveFailed(String),

    #[error("host error: {0}")]
    Host(String),

    #[error("codec error: {0}")]
    Codec(#[from] livesync_core::CodecError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("websocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),
}

impl From<tokio_tungstenite::tungstenite::Error> for AgentError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        AgentError::WebSocket(Box::new(err))
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> AgentError {
    AgentError::Io {
        path: path.into(),
        source,
    }
}
