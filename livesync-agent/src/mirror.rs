//! An [`Editor`] backed by a plain directory, used by `livesync follow`.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::broadcast;

use livesync_core::{Archive, Workspace};

use crate::editor::Editor;
use crate::error::AgentError;

/// Mirrors every loaded archive into a directory. Has no sub-targets and
/// never reports changes of its own.
pub struct DirectoryEditor {
    workspace: Workspace,
    loads: Mutex<u64>,
    changes: broadcast::Sender<()>,
}

impl DirectoryEditor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(1);
        Self {
            workspace: Workspace::new(root),
            loads: Mutex::new(0),
            changes,
        }
    }

    pub fn root(&self) -> &Path {
        self.workspace.root()
    }

    /// Number of archives mirrored so far.
    pub fn loads(&self) -> u64 {
        self.loads.lock().map(|n| *n).unwrap_or_default()
    }
}

#[async_trait]
impl Editor for DirectoryEditor {
    async fn load(&self, archive: &Archive) -> Result<(), AgentError> {
        let workspace = self.workspace.clone();
        let archive = archive.clone();
        let report = tokio::task::spawn_blocking(move || workspace.replace_with(archive.as_bytes()))
            .await
            .map_err(|err| AgentError::LoadRejected(format!("mirror task failed: {err}")))?
            .map_err(|err| AgentError::LoadRejected(err.to_string()))?;

        if let Ok(mut loads) = self.loads.lock() {
            *loads += 1;
        }
        tracing::info!(
            dir = %self.workspace.root().display(),
            files = report.written.len(),
            "mirrored archive"
        );
        Ok(())
    }

    async fn save(&self) -> Result<Archive, AgentError> {
        let workspace = self.workspace.clone();
        tokio::task::spawn_blocking(move || workspace.encode())
            .await
            .map_err(|err| AgentError::SaveFailed(format!("encode task failed: {err}")))?
            .map_err(|err| AgentError::SaveFailed(err.to_string()))
    }

    fn active_target(&self) -> Option<String> {
        None
    }

    fn set_active_target(&self, id: &str) -> Result<(), AgentError> {
        Err(AgentError::TargetNotFound(id.to_string()))
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<()> {
        self.changes.subscribe()
    }
}
