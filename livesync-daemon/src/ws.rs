//! Push-only WebSocket transport.
//!
//! One connection per observer. Server → client frames are binary, each a
//! complete packed archive. Anything the client sends is read only to notice
//! the connection closing.

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;

use crate::error::DaemonError;
use crate::session::SessionKind;
use crate::sync_core::CoreHandle;

/// Accept WebSocket observers on `listener` until shutdown.
pub async fn serve_sockets(
    listener: TcpListener,
    core: CoreHandle,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "websocket server listening");
    }
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to accept websocket connection");
                        continue;
                    }
                };
                let core = core.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_session(stream, core).await {
                        tracing::debug!(%peer, error = %err, "websocket session ended with error");
                    }
                });
            }
        }
    }
    Ok(())
}

async fn handle_socket_session(stream: TcpStream, core: CoreHandle) -> Result<(), DaemonError> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let mut session = core.open_session(SessionKind::Socket).await?;
    let id = session.id();
    let (mut sink, mut source) = ws.split();

    loop {
        tokio::select! {
            archive = session.next() => {
                let Some(archive) = archive else { break };
                sink.send(Message::Binary(archive.to_vec())).await?;
            }
            incoming = source.next() => match incoming {
                None | Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    tracing::debug!(session = %id, error = %err, "websocket read failed");
                    break;
                }
            }
        }
    }

    tracing::info!(session = %id, "client disconnected");
    Ok(())
}
