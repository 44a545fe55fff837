//! What an agent needs from the editor it drives.

use async_trait::async_trait;
use tokio::sync::broadcast;

use livesync_core::Archive;

use crate::error::AgentError;

#[async_trait]
pub trait Editor: Send + Sync {
    /// Replace the open document. Fails with [`AgentError::LoadRejected`]
    /// on content the editor cannot open.
    async fn load(&self, archive: &Archive) -> Result<(), AgentError>;

    /// Serialize the open document.
    async fn save(&self) -> Result<Archive, AgentError>;

    /// Id of the active sub-target, if any.
    fn active_target(&self) -> Option<String>;

    /// Fails with [`AgentError::TargetNotFound`] when `id` is not in the document.
    fn set_active_target(&self, id: &str) -> Result<(), AgentError>;

    /// Payload-free "document changed" notifications.
    fn subscribe_changes(&self) -> broadcast::Receiver<()>;
}
