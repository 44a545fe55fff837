//! Host-process side of the bidirectional agent.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::mpsc;

use livesync_core::host::{HostEvent, HostRequest, HostResponse};

use crate::error::{io_err, AgentError};

/// Request/event channel to the process that owns the workspace.
#[async_trait]
pub trait HostChannel: Send + Sync {
    /// Current archive, base64-encoded.
    async fn get_initial_archive(&self) -> Result<String, AgentError>;

    /// Hand an editor save (base64) to the host.
    async fn save_archive(&self, payload: String) -> Result<(), AgentError>;

    /// Stream of `archive_updated` payloads (base64). Ends when the host goes away.
    async fn subscribe(&self) -> Result<mpsc::Receiver<String>, AgentError>;
}

/// [`HostChannel`] over the daemon's Unix socket.
///
/// Saves carry the session id of the latest subscription so the daemon does
/// not push them back to this agent.
#[derive(Debug, Clone)]
pub struct SocketHost {
    socket: PathBuf,
    subscription: Arc<Mutex<Option<u64>>>,
}

impl SocketHost {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
            subscription: Arc::new(Mutex::new(None)),
        }
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    /// Daemon-side session id of the current subscription, if any.
    pub fn subscription(&self) -> Option<u64> {
        match self.subscription.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_subscription(&self, id: Option<u64>) {
        match self.subscription.lock() {
            Ok(mut guard) => *guard = id,
            Err(poisoned) => *poisoned.into_inner() = id,
        }
    }

    async fn connect(
        &self,
        request: &HostRequest,
    ) -> Result<(Lines<BufReader<OwnedReadHalf>>, OwnedWriteHalf, HostResponse), AgentError> {
        let stream = UnixStream::connect(&self.socket)
            .await
            .map_err(|e| io_err(&self.socket, e))?;
        let (reader, mut writer) = stream.into_split();

        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| io_err(&self.socket, e))?;

        let mut lines = BufReader::new(reader).lines();
        let reply = lines
            .next_line()
            .await
            .map_err(|e| io_err(&self.socket, e))?
            .ok_or(AgentError::TransportClosed)?;
        let response = serde_json::from_str(&reply)?;
        Ok((lines, writer, response))
    }

    async fn call(&self, request: &HostRequest) -> Result<serde_json::Value, AgentError> {
        let (_, _, response) = self.connect(request).await?;
        response.into_result().map_err(AgentError::Host)
    }
}

#[async_trait]
impl HostChannel for SocketHost {
    async fn get_initial_archive(&self) -> Result<String, AgentError> {
        match self.call(&HostRequest::GetInitialArchive).await? {
            serde_json::Value::String(payload) => Ok(payload),
            other => Err(AgentError::Host(format!(
                "expected base64 string, got {other}"
            ))),
        }
    }

    async fn save_archive(&self, payload: String) -> Result<(), AgentError> {
        let request = HostRequest::SaveArchive {
            archive: payload,
            session: self.subscription(),
        };
        self.call(&request)
            .await
            .map(|_| ())
            .map_err(|err| AgentError::SaveFailed(err.to_string()))
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<String>, AgentError> {
        let (mut lines, writer, response) = self.connect(&HostRequest::Subscribe).await?;
        let ack = response.into_result().map_err(AgentError::Host)?;
        let session = ack.get("session").and_then(serde_json::Value::as_u64);
        if session.is_none() {
            tracing::warn!("subscribe ack carried no session id; saves will be echoed back");
        }
        self.set_subscription(session);

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            // Keep the write half alive; dropping it would end the subscription.
            let _writer = writer;
            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(err) => {
                        tracing::warn!(error = %err, "host event stream read failed");
                        break;
                    }
                };
                match serde_json::from_str::<HostEvent>(&line) {
                    Ok(HostEvent::ArchiveUpdated { payload }) => {
                        if tx.send(payload).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => tracing::debug!(error = %err, "ignoring unknown host event"),
                }
            }
            tracing::info!("host event stream closed");
        });
        Ok(rx)
    }
}
