//! Push-only agent: follow a daemon's WebSocket and reload on every frame.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::tungstenite::Message;

use livesync_core::Archive;

use crate::editor::Editor;
use crate::error::AgentError;
use crate::reload::reload_preserving_selection;

/// Transport state, published on the liveness channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    ClosedRetrying,
}

impl ConnectionState {
    pub fn is_live(self) -> bool {
        self == ConnectionState::Open
    }
}

pub struct PushAgent<E: ?Sized> {
    url: String,
    reconnect_delay: Duration,
    editor: Arc<E>,
    state: watch::Sender<ConnectionState>,
}

impl<E> PushAgent<E>
where
    E: Editor + ?Sized,
{
    pub fn new(url: impl Into<String>, editor: Arc<E>, reconnect_delay: Duration) -> Self {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        Self {
            url: url.into(),
            reconnect_delay,
            editor,
            state,
        }
    }

    /// Liveness indicator: `Open` while connected.
    pub fn liveness(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Connect, apply pushes, reconnect after a fixed delay. Returns only on shutdown.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<(), AgentError> {
        loop {
            self.state.send_replace(ConnectionState::Connecting);
            tokio::select! {
                _ = shutdown_rx.recv() => return Ok(()),
                result = self.session() => match result {
                    Ok(()) => tracing::info!(url = %self.url, "connection closed"),
                    Err(err) => tracing::warn!(url = %self.url, error = %err, "connection failed"),
                }
            }

            self.state.send_replace(ConnectionState::ClosedRetrying);
            tracing::info!(
                delay_ms = self.reconnect_delay.as_millis() as u64,
                "reconnecting after delay"
            );
            tokio::select! {
                _ = shutdown_rx.recv() => return Ok(()),
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }
    }

    async fn session(&self) -> Result<(), AgentError> {
        let (ws, _) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        self.state.send_replace(ConnectionState::Open);
        tracing::info!(url = %self.url, "connected");

        let (_sink, mut source) = ws.split();
        while let Some(message) = source.next().await {
            match message? {
                Message::Binary(bytes) => {
                    let archive = Archive::from_bytes(bytes);
                    // Load failures are logged inside; the connection stays up.
                    let _ = reload_preserving_selection(self.editor.as_ref(), &archive).await;
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        Ok(())
    }
}
