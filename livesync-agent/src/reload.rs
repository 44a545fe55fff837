use livesync_core::Archive;

use crate::editor::Editor;
use crate::error::AgentError;

/// Load `archive` into the editor and put the previously active sub-target
/// back afterwards.
///
/// A rejected load is returned and selection is left alone. A sub-target
/// that no longer exists is not an error: the editor keeps its own default.
pub async fn reload_preserving_selection<E>(editor: &E, archive: &Archive) -> Result<(), AgentError>
where
    E: Editor + ?Sized,
{
    let selection = editor.active_target();

    if let Err(err) = editor.load(archive).await {
        tracing::warn!(error = %err, bytes = archive.len(), "editor rejected archive");
        return Err(err);
    }
    tracing::info!(bytes = archive.len(), "loaded archive into editor");

    let Some(target) = selection else {
        return Ok(());
    };
    match editor.set_active_target(&target) {
        Ok(()) => {}
        Err(AgentError::TargetNotFound(_)) => {
            tracing::debug!(%target, "previous target gone after reload");
        }
        Err(err) => {
            tracing::warn!(%target, error = %err, "failed to restore selection");
        }
    }
    Ok(())
}
