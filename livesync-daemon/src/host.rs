//! Host-process transport: newline-delimited JSON over a Unix socket.

use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;

use livesync_core::host::{HostEvent, HostRequest, HostResponse};
use livesync_core::Archive;

use crate::error::{io_err, DaemonError};
use crate::session::{Session, SessionId, SessionKind};
use crate::sync_core::{write_archive, ApplyOrigin, CoreHandle};

/// Serve host-process requests on `socket` until shutdown or `stop`.
pub async fn serve_host(
    socket: PathBuf,
    core: CoreHandle,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    if let Some(dir) = socket.parent() {
        fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "host channel listening");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let stream = match accepted {
                    Ok((stream, _)) => stream,
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to accept host connection");
                        continue;
                    }
                };
                let core = core.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_host_client(stream, core, shutdown_tx).await {
                        tracing::error!(error = %err, "host client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_host_client(
    stream: UnixStream,
    core: CoreHandle,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("host socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<HostRequest>(&line) {
            Ok(request) => request,
            Err(err) => {
                write_line(
                    &mut writer,
                    &HostResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        match request {
            HostRequest::Subscribe => {
                let session = core.open_session(SessionKind::Host).await?;
                let ack = json!({ "subscribed": true, "session": session.id().0 });
                write_line(&mut writer, &HostResponse::ok(ack)).await?;
                return stream_events(session, lines, writer).await;
            }
            HostRequest::Stop => {
                let _ = shutdown_tx.send(());
                write_line(&mut writer, &HostResponse::ok(json!({ "stopping": true }))).await?;
                return Ok(());
            }
            other => {
                let response = match dispatch(other, &core).await {
                    Ok(data) => HostResponse::ok(data),
                    Err(err) => HostResponse::error(err.to_string()),
                };
                write_line(&mut writer, &response).await?;
            }
        }
    }

    Ok(())
}

async fn dispatch(request: HostRequest, core: &CoreHandle) -> Result<Value, DaemonError> {
    match request {
        HostRequest::GetInitialArchive => Ok(Value::String(core.current().await?.to_base64())),
        HostRequest::SaveArchive { archive, session } => {
            let archive = Archive::from_base64(&archive)?;
            tracing::info!(bytes = archive.len(), ?session, "received archive from editor");
            let from = session.map(SessionId);
            core.apply(archive, ApplyOrigin::HostSave { from }).await
        }
        HostRequest::Status => {
            let status = core.status().await?;
            let mut payload = serde_json::to_value(status)?;
            payload["running"] = Value::Bool(true);
            Ok(payload)
        }
        HostRequest::Import { path } => {
            let bytes = tokio::fs::read(&path).await.map_err(|e| io_err(&path, e))?;
            core.apply(Archive::from_bytes(bytes), ApplyOrigin::Import).await
        }
        HostRequest::Export { path } => {
            let archive = core.rebuild().await?;
            write_archive(path.clone(), &archive).await?;
            tracing::info!(path = %path.display(), "exported archive");
            Ok(json!({ "path": path.display().to_string(), "bytes": archive.len() }))
        }
        HostRequest::Subscribe | HostRequest::Stop => Err(DaemonError::Protocol(
            "connection-level command dispatched as request".to_string(),
        )),
    }
}

/// Forward every archive pushed to `session` as an `archive_updated` event line.
async fn stream_events(
    mut session: Session,
    mut lines: Lines<BufReader<OwnedReadHalf>>,
    mut writer: OwnedWriteHalf,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            archive = session.next() => {
                let Some(archive) = archive else { break };
                let event = HostEvent::ArchiveUpdated { payload: archive.to_base64() };
                write_line(&mut writer, &event).await?;
                tracing::debug!(session = %session.id(), bytes = archive.len(), "emitted archive_updated");
            }
            line = lines.next_line() => match line {
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => break,
            }
        }
    }
    Ok(())
}

async fn write_line<T: serde::Serialize>(
    writer: &mut OwnedWriteHalf,
    message: &T,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(message)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("host socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("host socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("host socket flush", e))?;
    Ok(())
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "host socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale host socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}
