//! Bidirectional agent: host pushes flow into the editor, editor edits flow
//! back to the host as debounced saves.
//!
//! Inbound and outbound share two things only: the [`EchoGuard`] and the
//! save timer, which every inbound update cancels (last inbound wins).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;

use livesync_core::config::AgentConfig;
use livesync_core::{Archive, Debouncer};

use crate::echo::EchoGuard;
use crate::editor::Editor;
use crate::error::AgentError;
use crate::host::HostChannel;
use crate::reload::reload_preserving_selection;

/// Timings for [`BridgeAgent`].
#[derive(Debug, Clone, Copy)]
pub struct BridgeTimings {
    pub save_debounce: Duration,
    pub settle_grace: Duration,
}

impl From<&AgentConfig> for BridgeTimings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            save_debounce: config.save_debounce(),
            settle_grace: config.settle_grace(),
        }
    }
}

impl Default for BridgeTimings {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}

pub struct BridgeAgent<E: ?Sized, H: ?Sized> {
    editor: Arc<E>,
    host: Arc<H>,
    guard: EchoGuard,
    save: Debouncer,
}

impl<E, H> BridgeAgent<E, H>
where
    E: Editor + ?Sized,
    H: HostChannel + ?Sized,
{
    pub fn new(editor: Arc<E>, host: Arc<H>, timings: BridgeTimings) -> Self {
        Self {
            editor,
            host,
            guard: EchoGuard::new(timings.settle_grace),
            save: Debouncer::new(timings.save_debounce),
        }
    }

    /// Load the initial archive, then serve both directions until shutdown
    /// or the host event stream ends.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<(), AgentError> {
        let mut changes = self.editor.subscribe_changes();

        match self.host.get_initial_archive().await {
            Ok(payload) => self.apply_inbound(&payload).await,
            Err(err) => tracing::warn!(error = %err, "failed to fetch initial archive"),
        }
        let mut inbound = self.host.subscribe().await?;

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => return Ok(()),
                payload = inbound.recv() => {
                    let Some(payload) = payload else {
                        tracing::warn!("host event stream ended");
                        return Err(AgentError::TransportClosed);
                    };
                    self.apply_inbound(&payload).await;
                }
                change = changes.recv() => match change {
                    Ok(()) | Err(RecvError::Lagged(_)) => self.on_editor_change(Instant::now()),
                    Err(RecvError::Closed) => {
                        tracing::info!("editor change stream closed");
                        return Ok(());
                    }
                },
                _ = self.save.fired() => self.flush_save().await,
            }
        }
    }

    async fn apply_inbound(&mut self, payload: &str) {
        let archive = match Archive::from_base64(payload) {
            Ok(archive) => archive,
            Err(err) => {
                tracing::warn!(error = %err, "dropping undecodable archive from host");
                return;
            }
        };
        if self.save.cancel() {
            tracing::debug!("inbound archive supersedes pending save");
        }
        self.guard.begin_inbound();
        let _ = reload_preserving_selection(self.editor.as_ref(), &archive).await;
        self.guard.finish_inbound(Instant::now());
    }

    fn on_editor_change(&mut self, now: Instant) {
        if !self.guard.allows_outbound(now) {
            tracing::trace!(state = ?self.guard.state(), "editor change suppressed");
            return;
        }
        self.save.touch_at(now);
    }

    async fn flush_save(&mut self) {
        if !self.guard.allows_outbound(Instant::now()) {
            return;
        }
        let archive = match self.editor.save().await {
            Ok(archive) => archive,
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize project");
                return;
            }
        };
        let bytes = archive.len();
        match self.host.save_archive(archive.to_base64()).await {
            Ok(()) => tracing::info!(bytes, "saved project to host"),
            Err(err) => tracing::warn!(bytes, error = %err, "save dropped"),
        }
    }
}
