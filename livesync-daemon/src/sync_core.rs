//! Sync core: owns the current archive and the session registry.
//!
//! [`SyncCore`] is plain synchronous state so it can be driven directly in
//! tests. At runtime a single [`core_task`] owns it and processes
//! [`CoreCommand`]s one at a time; encodes run on the blocking pool but are
//! awaited before the next command, so two encodes never overlap and a
//! session always opens against the archive published most recently.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;

use livesync_core::{Archive, CodecError, Workspace};

use crate::error::{io_err, DaemonError};
use crate::session::{Session, SessionId, SessionKind, SessionRegistry};
use crate::watcher::ChangeSignal;

/// Result of feeding one encode result into the core.
#[derive(Debug)]
pub enum RebuildOutcome {
    /// New archive is current and was queued for `delivered` sessions.
    Published { bytes: usize, delivered: usize },
    /// Identical to the current archive inside the host echo window.
    Suppressed,
    /// Encode failed; the previous archive stays current.
    Rejected(CodecError),
}

#[derive(Debug, Clone, Serialize)]
pub struct CoreStatus {
    pub workspace: String,
    pub sessions: usize,
    pub host_subscribers: usize,
    pub archive_bytes: Option<usize>,
    pub last_build_at: Option<DateTime<Utc>>,
    pub builds: u64,
    pub failed_builds: u64,
}

pub struct SyncCore {
    workspace: Workspace,
    current: Option<Archive>,
    sessions: SessionRegistry,
    echo_window: Duration,
    echo_until: Option<Instant>,
    last_build_at: Option<DateTime<Utc>>,
    builds: u64,
    failed_builds: u64,
}

impl SyncCore {
    pub fn new(workspace: Workspace, echo_window: Duration) -> Self {
        Self {
            workspace,
            current: None,
            sessions: SessionRegistry::new(),
            echo_window,
            echo_until: None,
            last_build_at: None,
            builds: 0,
            failed_builds: 0,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn current(&self) -> Option<&Archive> {
        self.current.as_ref()
    }

    /// Register an open session and hand it the current archive right away.
    pub fn open_session(&mut self, kind: SessionKind) -> Session {
        let session = self.sessions.register(kind);
        if let Some(archive) = &self.current {
            self.sessions.send_to(session.id(), archive);
        }
        tracing::info!(session = %session.id(), ?kind, "client connected");
        session
    }

    /// Apply an encode result: swap and broadcast on success, keep the old
    /// archive on failure. `exclude` is the session the archive came from.
    pub fn on_encoded(
        &mut self,
        result: Result<Archive, CodecError>,
        exclude: Option<SessionId>,
        now: Instant,
    ) -> RebuildOutcome {
        let archive = match result {
            Ok(archive) => archive,
            Err(err) => {
                self.failed_builds += 1;
                tracing::error!(error = %err, "skipping send (build error)");
                return RebuildOutcome::Rejected(err);
            }
        };

        if self.within_echo_window(now) && self.current.as_ref() == Some(&archive) {
            tracing::debug!("rebuild matches applied archive, not re-broadcasting");
            return RebuildOutcome::Suppressed;
        }

        let bytes = archive.len();
        let delivered = self.sessions.broadcast(&archive, exclude);
        self.current = Some(archive);
        self.builds += 1;
        self.last_build_at = Some(Utc::now());
        tracing::info!(bytes, delivered, "sent archive to client(s)");
        RebuildOutcome::Published { bytes, delivered }
    }

    /// Open the echo window after the core itself wrote the workspace.
    pub fn note_workspace_write(&mut self, now: Instant) {
        self.echo_until = Some(now + self.echo_window);
    }

    fn within_echo_window(&self, now: Instant) -> bool {
        self.echo_until.is_some_and(|until| now < until)
    }

    pub fn status(&self) -> CoreStatus {
        CoreStatus {
            workspace: self.workspace.root().display().to_string(),
            sessions: self.sessions.open_count(),
            host_subscribers: self.sessions.open_count_of(SessionKind::Host),
            archive_bytes: self.current.as_ref().map(Archive::len),
            last_build_at: self.last_build_at,
            builds: self.builds,
            failed_builds: self.failed_builds,
        }
    }
}

// ---------------------------------------------------------------------------
// Runtime wiring
// ---------------------------------------------------------------------------

pub(crate) enum CoreCommand {
    Changed(ChangeSignal),
    OpenSession {
        kind: SessionKind,
        respond_to: oneshot::Sender<Session>,
    },
    /// Current archive, building one first if none exists yet.
    Current {
        respond_to: oneshot::Sender<Result<Archive, String>>,
    },
    /// Fresh encode from disk, published like a change signal.
    Rebuild {
        respond_to: oneshot::Sender<Result<Archive, String>>,
    },
    /// Write an archive into the workspace, then rebuild and publish.
    Apply {
        archive: Archive,
        origin: ApplyOrigin,
        respond_to: oneshot::Sender<Result<Value, String>>,
    },
    Status {
        respond_to: oneshot::Sender<CoreStatus>,
    },
}

/// Who asked for an archive to be written into the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOrigin {
    /// Editor save via the host channel, merged over the workspace. `from` is
    /// the sender's own subscription, which is not sent its save back.
    HostSave { from: Option<SessionId> },
    /// Explicit import: replaces the workspace and is pushed to everyone.
    Import,
}

/// Cloneable handle used by the watcher and transports to talk to the core.
#[derive(Clone)]
pub struct CoreHandle {
    tx: mpsc::Sender<CoreCommand>,
}

impl CoreHandle {
    pub(crate) fn channel(capacity: usize) -> (Self, mpsc::Receiver<CoreCommand>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    async fn send(&self, command: CoreCommand) -> Result<(), DaemonError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| DaemonError::ChannelClosed("core queue"))
    }

    pub async fn changed(&self, signal: ChangeSignal) -> Result<(), DaemonError> {
        self.send(CoreCommand::Changed(signal)).await
    }

    pub async fn open_session(&self, kind: SessionKind) -> Result<Session, DaemonError> {
        let (tx, rx) = oneshot::channel();
        self.send(CoreCommand::OpenSession { kind, respond_to: tx })
            .await?;
        rx.await
            .map_err(|_| DaemonError::ChannelClosed("core response"))
    }

    pub async fn current(&self) -> Result<Archive, DaemonError> {
        let (tx, rx) = oneshot::channel();
        self.send(CoreCommand::Current { respond_to: tx }).await?;
        rx.await
            .map_err(|_| DaemonError::ChannelClosed("core response"))?
            .map_err(DaemonError::Protocol)
    }

    pub async fn rebuild(&self) -> Result<Archive, DaemonError> {
        let (tx, rx) = oneshot::channel();
        self.send(CoreCommand::Rebuild { respond_to: tx }).await?;
        rx.await
            .map_err(|_| DaemonError::ChannelClosed("core response"))?
            .map_err(DaemonError::Protocol)
    }

    pub async fn apply(&self, archive: Archive, origin: ApplyOrigin) -> Result<Value, DaemonError> {
        let (tx, rx) = oneshot::channel();
        self.send(CoreCommand::Apply {
            archive,
            origin,
            respond_to: tx,
        })
        .await?;
        rx.await
            .map_err(|_| DaemonError::ChannelClosed("core response"))?
            .map_err(DaemonError::Protocol)
    }

    pub async fn status(&self) -> Result<CoreStatus, DaemonError> {
        let (tx, rx) = oneshot::channel();
        self.send(CoreCommand::Status { respond_to: tx }).await?;
        rx.await
            .map_err(|_| DaemonError::ChannelClosed("core response"))
    }
}

/// Spawn a core task for `core` and return a handle to it.
///
/// The task stops when every handle is dropped or `shutdown` fires.
pub fn spawn_core(
    core: SyncCore,
    shutdown: broadcast::Receiver<()>,
) -> (CoreHandle, tokio::task::JoinHandle<Result<(), DaemonError>>) {
    let (handle, rx) = CoreHandle::channel(64);
    let task = tokio::spawn(core_task(core, rx, shutdown));
    (handle, task)
}

pub(crate) async fn core_task(
    mut core: SyncCore,
    mut commands: mpsc::Receiver<CoreCommand>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            command = commands.recv() => {
                let Some(command) = command else { break };
                handle_command(&mut core, command).await?;
            }
        }
    }
    Ok(())
}

async fn handle_command(core: &mut SyncCore, command: CoreCommand) -> Result<(), DaemonError> {
    match command {
        CoreCommand::Changed(signal) => {
            tracing::info!(paths = ?signal.display_paths(), "file change detected");
            let result = encode_blocking(core.workspace().clone()).await?;
            core.on_encoded(result, None, Instant::now());
        }
        CoreCommand::OpenSession { kind, respond_to } => {
            let _ = respond_to.send(core.open_session(kind));
        }
        CoreCommand::Current { respond_to } => {
            let outcome = match core.current().cloned() {
                Some(archive) => Ok(archive),
                None => rebuild(core).await?,
            };
            let _ = respond_to.send(outcome);
        }
        CoreCommand::Rebuild { respond_to } => {
            let _ = respond_to.send(rebuild(core).await?);
        }
        CoreCommand::Apply {
            archive,
            origin,
            respond_to,
        } => {
            let _ = respond_to.send(apply(core, archive, origin).await?);
        }
        CoreCommand::Status { respond_to } => {
            let _ = respond_to.send(core.status());
        }
    }
    Ok(())
}

async fn rebuild(core: &mut SyncCore) -> Result<Result<Archive, String>, DaemonError> {
    let result = encode_blocking(core.workspace().clone()).await?;
    Ok(match core.on_encoded(result, None, Instant::now()) {
        RebuildOutcome::Rejected(err) => Err(err.to_string()),
        RebuildOutcome::Published { .. } | RebuildOutcome::Suppressed => core
            .current()
            .cloned()
            .ok_or_else(|| "no archive has been built".to_string()),
    })
}

async fn apply(
    core: &mut SyncCore,
    archive: Archive,
    origin: ApplyOrigin,
) -> Result<Result<Value, String>, DaemonError> {
    let workspace = core.workspace().clone();
    let received = archive.len();
    let written = tokio::task::spawn_blocking(move || match origin {
        ApplyOrigin::HostSave { .. } => workspace.decode(archive.as_bytes()),
        ApplyOrigin::Import => workspace.replace_with(archive.as_bytes()),
    })
    .await
    .map_err(|err| DaemonError::Protocol(format!("decode task join error: {err}")))?;

    let report = match written {
        Ok(report) => report,
        Err(err) => {
            tracing::error!(error = %err, ?origin, "failed to write archive into workspace");
            return Ok(Err(err.to_string()));
        }
    };
    tracing::info!(bytes = received, files = report.written.len(), ?origin, "received archive");

    let exclude = match origin {
        ApplyOrigin::HostSave { from } => from,
        ApplyOrigin::Import => None,
    };
    let result = encode_blocking(core.workspace().clone()).await?;
    let outcome = core.on_encoded(result, exclude, Instant::now());
    // The watcher will see our own writes; its identical rebuild is not re-sent.
    core.note_workspace_write(Instant::now());

    Ok(match outcome {
        RebuildOutcome::Rejected(err) => Err(err.to_string()),
        RebuildOutcome::Published { bytes, delivered } => Ok(json!({
            "files": report.written.len(),
            "archive_bytes": bytes,
            "delivered": delivered,
        })),
        RebuildOutcome::Suppressed => Ok(json!({
            "files": report.written.len(),
            "delivered": 0,
        })),
    })
}

async fn encode_blocking(workspace: Workspace) -> Result<Result<Archive, CodecError>, DaemonError> {
    tokio::task::spawn_blocking(move || workspace.encode())
        .await
        .map_err(|err| DaemonError::Protocol(format!("encode task join error: {err}")))
}

/// Write an archive's bytes to `path`, used by export.
pub(crate) async fn write_archive(path: PathBuf, archive: &Archive) -> Result<(), DaemonError> {
    tokio::fs::write(&path, archive.as_bytes())
        .await
        .map_err(|e| io_err(&path, e))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use livesync_core::MANIFEST_NAME;
    use tempfile::TempDir;

    use super::*;

    fn core_for(dir: &TempDir) -> SyncCore {
        SyncCore::new(Workspace::new(dir.path()), Duration::from_millis(1000))
    }

    fn write_manifest(dir: &TempDir, manifest: &str) {
        fs::write(dir.path().join(MANIFEST_NAME), manifest).unwrap();
    }

    #[test]
    fn late_session_receives_latest_archive_only() {
        let dir = TempDir::new().unwrap();
        let mut core = core_for(&dir);

        write_manifest(&dir, r#"{"v":1}"#);
        let a1 = core.workspace().encode().unwrap();
        core.on_encoded(Ok(a1.clone()), None, Instant::now());

        write_manifest(&dir, r#"{"v":2}"#);
        let a2 = core.workspace().encode().unwrap();
        core.on_encoded(Ok(a2.clone()), None, Instant::now());

        let mut session = core.open_session(SessionKind::Socket);
        assert_eq!(session.try_next(), Some(a2));
        assert_eq!(session.try_next(), None);
    }

    #[test]
    fn session_opened_before_any_build_waits() {
        let dir = TempDir::new().unwrap();
        let mut core = core_for(&dir);
        let mut session = core.open_session(SessionKind::Socket);
        assert_eq!(session.try_next(), None);
    }

    #[test]
    fn broken_manifest_keeps_previous_archive() {
        let dir = TempDir::new().unwrap();
        let mut core = core_for(&dir);
        write_manifest(&dir, r#"{"a":1}"#);
        let good = core.workspace().encode().unwrap();
        core.on_encoded(Ok(good.clone()), None, Instant::now());
        let mut session = core.open_session(SessionKind::Socket);
        session.try_next();

        write_manifest(&dir, r#"{"a":}"#);
        let result = core.workspace().encode();
        let outcome = core.on_encoded(result, None, Instant::now());

        assert!(matches!(
            outcome,
            RebuildOutcome::Rejected(CodecError::ManifestSyntax { .. })
        ));
        assert_eq!(core.current(), Some(&good));
        assert_eq!(session.try_next(), None, "nothing broadcast");
        assert_eq!(core.status().failed_builds, 1);
    }

    #[test]
    fn identical_rebuild_inside_echo_window_is_suppressed() {
        let dir = TempDir::new().unwrap();
        let mut core = core_for(&dir);
        write_manifest(&dir, "{}");
        let archive = core.workspace().encode().unwrap();
        let now = Instant::now();

        core.on_encoded(Ok(archive.clone()), None, now);
        core.note_workspace_write(now);
        let mut session = core.open_session(SessionKind::Socket);
        session.try_next();

        let outcome = core.on_encoded(Ok(archive.clone()), None, now + Duration::from_millis(500));
        assert!(matches!(outcome, RebuildOutcome::Suppressed));
        assert_eq!(session.try_next(), None);

        let outcome = core.on_encoded(Ok(archive), None, now + Duration::from_millis(1500));
        assert!(matches!(outcome, RebuildOutcome::Published { delivered: 1, .. }));
    }

    #[tokio::test]
    async fn host_save_reaches_everyone_but_its_sender() {
        let src = TempDir::new().unwrap();
        write_manifest(&src, r#"{"from":"editor"}"#);
        let saved = Workspace::new(src.path()).encode().unwrap();

        let dir = TempDir::new().unwrap();
        write_manifest(&dir, "{}");
        let (shutdown_tx, _) = broadcast::channel(1);
        let (handle, _task) = spawn_core(core_for(&dir), shutdown_tx.subscribe());

        let mut sender = handle.open_session(SessionKind::Host).await.unwrap();
        let mut other_host = handle.open_session(SessionKind::Host).await.unwrap();
        let mut socket = handle.open_session(SessionKind::Socket).await.unwrap();

        let from = Some(sender.id());
        handle.apply(saved, ApplyOrigin::HostSave { from }).await.unwrap();

        let pushed = socket.next().await.unwrap();
        assert!(pushed.entries().unwrap()[MANIFEST_NAME].starts_with(b"{\n  \"from\""));
        assert_eq!(other_host.next().await, Some(pushed));
        assert_eq!(sender.try_next(), None);
    }

    #[tokio::test]
    async fn rebuild_after_import_is_not_sent_twice() {
        let dir = TempDir::new().unwrap();
        write_manifest(&dir, r#"{"v":1}"#);
        let imported = Workspace::new(dir.path()).encode().unwrap();

        let (shutdown_tx, _) = broadcast::channel(1);
        let (handle, _task) = spawn_core(core_for(&dir), shutdown_tx.subscribe());
        let mut socket = handle.open_session(SessionKind::Socket).await.unwrap();

        handle.apply(imported, ApplyOrigin::Import).await.unwrap();
        assert!(socket.next().await.is_some());

        // What the watcher would report for the files the import just wrote.
        let signal = ChangeSignal {
            paths: [dir.path().join(MANIFEST_NAME)].into_iter().collect(),
        };
        handle.changed(signal).await.unwrap();
        assert_eq!(handle.status().await.unwrap().builds, 1);
        assert_eq!(socket.try_next(), None);
    }

    #[tokio::test]
    async fn current_builds_on_first_request() {
        let dir = TempDir::new().unwrap();
        write_manifest(&dir, "{}");
        let (shutdown_tx, _) = broadcast::channel(1);
        let (handle, _task) = spawn_core(core_for(&dir), shutdown_tx.subscribe());

        let archive = handle.current().await.unwrap();
        assert!(archive.entries().unwrap().contains_key(MANIFEST_NAME));
        let status = handle.status().await.unwrap();
        assert_eq!(status.builds, 1);
        assert!(status.last_build_at.is_some());
    }
}
