//! Workspace watcher: raw filesystem events → coalesced change signals.
//!
//! States are `idle` (no pending paths) and `debouncing` (timer armed). Every
//! create/modify/remove event restarts the quiet window. When it expires, each
//! pending path is re-stat'ed; if any size or mtime moved since its last event
//! the write is still in progress and the timer is re-armed for the stability
//! window instead of emitting.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use livesync_core::Debouncer;

use crate::error::{io_err, DaemonError};
use crate::sync_core::CoreHandle;

/// One coalesced notification that the workspace changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSignal {
    pub paths: BTreeSet<PathBuf>,
}

impl ChangeSignal {
    /// File names only, for log lines.
    pub fn display_paths(&self) -> Vec<String> {
        self.paths
            .iter()
            .map(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| p.display().to_string())
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    len: u64,
    modified: Option<SystemTime>,
}

fn fingerprint(path: &Path) -> Option<Fingerprint> {
    let meta = fs::metadata(path).ok()?;
    Some(Fingerprint {
        len: meta.len(),
        modified: meta.modified().ok(),
    })
}

/// The debounce + write-stability state machine, free of any I/O loop.
#[derive(Debug)]
pub struct ChangeCoalescer {
    debounce: Debouncer,
    stability: Duration,
    pending: HashMap<PathBuf, Option<Fingerprint>>,
}

impl ChangeCoalescer {
    pub fn new(quiet_window: Duration, stability_window: Duration) -> Self {
        Self {
            debounce: Debouncer::new(quiet_window),
            stability: stability_window,
            pending: HashMap::new(),
        }
    }

    pub fn is_debouncing(&self) -> bool {
        self.debounce.is_pending()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    /// Record a raw event for `path` at `now`.
    pub fn record(&mut self, path: PathBuf, now: Instant) {
        let seen = fingerprint(&path);
        self.pending.insert(path, seen);
        self.debounce.touch_at(now);
    }

    /// Called once the deadline has passed. Emits the signal if every
    /// pending path is stable, otherwise re-arms for the stability window.
    pub fn on_deadline(&mut self) -> Option<ChangeSignal> {
        if !self.debounce.fire_if_due(Instant::now()) {
            return None;
        }
        let mut settled = true;
        for (path, seen) in self.pending.iter_mut() {
            let now_seen = fingerprint(path);
            if now_seen != *seen {
                *seen = now_seen;
                settled = false;
            }
        }
        if !settled {
            tracing::debug!("write still in progress, waiting for it to settle");
            self.debounce.rearm_after(self.stability);
            return None;
        }
        let paths = self.pending.drain().map(|(path, _)| path).collect();
        Some(ChangeSignal { paths })
    }

    /// Wait for the current deadline, then try to emit.
    pub async fn next_signal(&mut self) -> Option<ChangeSignal> {
        livesync_core::debounce::sleep_until_opt(self.debounce.deadline()).await;
        self.on_deadline()
    }
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Watch `root` (non-recursively) and forward change signals to the core.
pub async fn watcher_task(
    root: PathBuf,
    quiet_window: Duration,
    stability_window: Duration,
    core: CoreHandle,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    if !root.exists() {
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
    }
    // Canonicalize so event paths (which may arrive resolved, e.g. under
    // /private/var on macOS) match the `starts_with` check below.
    let root = fs::canonicalize(&root).unwrap_or(root);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;
    watcher.watch(&root, RecursiveMode::NonRecursive)?;
    tracing::info!(path = %root.display(), "watching workspace");

    let mut coalescer = ChangeCoalescer::new(quiet_window, stability_window);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            signal = coalescer.next_signal(), if coalescer.is_debouncing() => {
                if let Some(signal) = signal {
                    if core.changed(signal).await.is_err() {
                        tracing::debug!("core stopped, watcher exiting");
                        break;
                    }
                }
            }
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "watcher event error");
                        continue;
                    }
                };
                if !is_relevant_event_kind(&event.kind) {
                    continue;
                }
                let now = Instant::now();
                for path in event.paths {
                    if path.starts_with(&root) && path != root {
                        coalescer.record(path, now);
                    }
                }
            }
        }
    }

    Ok(())
}
