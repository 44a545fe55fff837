mod support;

use livesync_agent::{reload_preserving_selection, AgentError, Editor};
use livesync_core::Archive;

use support::{project, MockEditor};

#[tokio::test]
async fn selection_survives_reload_when_target_still_exists() {
    let editor = MockEditor::new();
    editor.load(&project(&["Stage", "sprite-1", "sprite-2"])).await.unwrap();
    editor.set_active_target("sprite-1").unwrap();

    reload_preserving_selection(editor.as_ref(), &project(&["Stage", "sprite-1", "sprite-3"]))
        .await
        .unwrap();

    assert_eq!(editor.active_target().as_deref(), Some("sprite-1"));
}

#[tokio::test]
async fn missing_target_falls_back_to_editor_default() {
    let editor = MockEditor::new();
    editor.load(&project(&["Stage", "sprite-1"])).await.unwrap();
    editor.set_active_target("sprite-1").unwrap();

    reload_preserving_selection(editor.as_ref(), &project(&["Stage", "sprite-2"]))
        .await
        .unwrap();

    assert_eq!(editor.active_target().as_deref(), Some("Stage"));
}

#[tokio::test]
async fn rejected_load_leaves_selection_alone() {
    let editor = MockEditor::new();
    editor.load(&project(&["Stage", "sprite-1"])).await.unwrap();
    editor.set_active_target("sprite-1").unwrap();

    let err = reload_preserving_selection(editor.as_ref(), &Archive::from_bytes(b"junk".to_vec()))
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::LoadRejected(_)));
    assert_eq!(editor.active_target().as_deref(), Some("sprite-1"));
    assert_eq!(editor.loads(), 1);
}
