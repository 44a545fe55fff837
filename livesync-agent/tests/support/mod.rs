#![allow(dead_code)]

use std::fs;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use livesync_agent::{AgentError, Editor, HostChannel};
use livesync_core::{Archive, Workspace};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::{broadcast, mpsc};

/// Pack a project whose manifest lists `targets` by name.
pub fn project(targets: &[&str]) -> Archive {
    let dir = TempDir::new().expect("project dir");
    let targets: Vec<Value> = targets.iter().map(|name| json!({ "name": name })).collect();
    let manifest = serde_json::to_vec(&json!({ "targets": targets })).expect("manifest");
    fs::write(dir.path().join("project.json"), manifest).expect("write manifest");
    Workspace::new(dir.path()).encode().expect("encode project")
}

#[derive(Default)]
struct EditorState {
    targets: Vec<String>,
    active: Option<String>,
    document: Option<Archive>,
}

/// In-memory editor: sub-targets are the manifest's `targets[].name`, the
/// first one becomes active after a load.
pub struct MockEditor {
    state: Mutex<EditorState>,
    changes: broadcast::Sender<()>,
    emit_on_load: bool,
    loads: AtomicUsize,
}

impl MockEditor {
    pub fn new() -> Arc<Self> {
        Self::build(false)
    }

    /// An editor that fires a change notification from inside every load.
    pub fn noisy() -> Arc<Self> {
        Self::build(true)
    }

    fn build(emit_on_load: bool) -> Arc<Self> {
        let (changes, _) = broadcast::channel(16);
        Arc::new(Self {
            state: Mutex::new(EditorState::default()),
            changes,
            emit_on_load,
            loads: AtomicUsize::new(0),
        })
    }

    /// Simulate a user edit.
    pub fn edit(&self) {
        let _ = self.changes.send(());
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn document(&self) -> Option<Archive> {
        self.state.lock().unwrap().document.clone()
    }
}

#[async_trait]
impl Editor for MockEditor {
    async fn load(&self, archive: &Archive) -> Result<(), AgentError> {
        let entries = archive
            .entries()
            .map_err(|err| AgentError::LoadRejected(err.to_string()))?;
        let manifest = entries
            .get("project.json")
            .ok_or_else(|| AgentError::LoadRejected("missing project.json".to_string()))?;
        let value: Value = serde_json::from_slice(manifest)
            .map_err(|err| AgentError::LoadRejected(err.to_string()))?;
        let targets: Vec<String> = value["targets"]
            .as_array()
            .map(|targets| {
                targets
                    .iter()
                    .filter_map(|t| t["name"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        {
            let mut state = self.state.lock().unwrap();
            state.active = targets.first().cloned();
            state.targets = targets;
            state.document = Some(archive.clone());
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.emit_on_load {
            let _ = self.changes.send(());
        }
        Ok(())
    }

    async fn save(&self) -> Result<Archive, AgentError> {
        self.document()
            .ok_or_else(|| AgentError::SaveFailed("nothing loaded".to_string()))
    }

    fn active_target(&self) -> Option<String> {
        self.state.lock().unwrap().active.clone()
    }

    fn set_active_target(&self, id: &str) -> Result<(), AgentError> {
        let mut state = self.state.lock().unwrap();
        if state.targets.iter().any(|t| t == id) {
            state.active = Some(id.to_string());
            Ok(())
        } else {
            Err(AgentError::TargetNotFound(id.to_string()))
        }
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<()> {
        self.changes.subscribe()
    }
}

/// Host double: serves a fixed initial archive, forwards test-sent events,
/// records saves.
pub struct MockHost {
    initial: String,
    events: Mutex<Option<mpsc::Receiver<String>>>,
    saves: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MockHost {
    pub fn new(initial: &Archive) -> (Arc<Self>, mpsc::Sender<String>) {
        let (tx, rx) = mpsc::channel(16);
        let host = Arc::new(Self {
            initial: initial.to_base64(),
            events: Mutex::new(Some(rx)),
            saves: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            fail_saves: AtomicBool::new(false),
        });
        (host, tx)
    }

    pub fn saves(&self) -> Vec<String> {
        self.saves.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl HostChannel for MockHost {
    async fn get_initial_archive(&self) -> Result<String, AgentError> {
        Ok(self.initial.clone())
    }

    async fn save_archive(&self, payload: String) -> Result<(), AgentError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(AgentError::SaveFailed("host unavailable".to_string()));
        }
        self.saves.lock().unwrap().push(payload);
        Ok(())
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<String>, AgentError> {
        self.events
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| AgentError::Host("already subscribed".to_string()))
    }
}
