use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::broadcast;

use livesync_core::{LiveSyncConfig, Prepared, TemplateSource, Workspace};

use crate::error::{io_err, DaemonError};
use crate::host::serve_host;
use crate::sync_core::{core_task, CoreHandle, RebuildOutcome, SyncCore};
use crate::watcher::watcher_task;
use crate::ws::serve_sockets;

/// Everything the daemon needs to start, resolved from config + CLI flags.
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    pub workspace: Workspace,
    pub template: TemplateSource,
    /// Archive to import at startup, replacing the workspace.
    pub source_archive: Option<PathBuf>,
    pub listen: SocketAddr,
    /// Host-channel socket; `None` disables the host transport.
    pub socket: Option<PathBuf>,
    pub quiet_window: Duration,
    pub stability_window: Duration,
    pub echo_window: Duration,
    /// Emit JSON log lines instead of human-readable ones.
    pub json_logs: bool,
}

impl DaemonOptions {
    pub fn from_config(config: &LiveSyncConfig) -> Result<Self, DaemonError> {
        Ok(Self {
            workspace: Workspace::new(config.workspace.clone()).with_options(config.encode_options()),
            template: TemplateSource::from_option(config.template.clone()),
            source_archive: None,
            listen: SocketAddr::new(config.bind, config.port),
            socket: Some(config.socket_path()?),
            quiet_window: config.watch.quiet_window(),
            stability_window: config.watch.stability_window(),
            echo_window: config.echo_window(),
            json_logs: false,
        })
    }
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(options: DaemonOptions) -> Result<(), DaemonError> {
    if options.json_logs {
        livesync_core::logging::init_json_tracing();
    } else {
        livesync_core::logging::init_tracing();
    }
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(options))
}

/// Prepare the workspace, publish the first archive, then run every task
/// until one of them stops or ctrl-c arrives.
pub async fn run(options: DaemonOptions) -> Result<(), DaemonError> {
    let workspace = options.workspace.clone();
    let mode = workspace.startup_mode(options.source_archive.clone(), options.template.clone());
    match workspace.prepare(&mode)? {
        Prepared::Imported(report) => {
            tracing::info!(files = report.written.len(), "imported archive into workspace")
        }
        Prepared::Seeded(files) => tracing::info!(files = files.len(), "seeded workspace"),
        Prepared::Existing => tracing::info!("using existing workspace"),
    }
    if let Err(err) = workspace.refresh_guide(&options.template) {
        tracing::warn!(error = %err, "failed to refresh workspace guide");
    }
    tracing::info!(workspace = %workspace.root().display(), "workspace ready");

    let mut core = SyncCore::new(workspace.clone(), options.echo_window);
    match core.on_encoded(workspace.encode(), None, tokio::time::Instant::now()) {
        RebuildOutcome::Rejected(_) => {
            tracing::warn!("initial archive build failed")
        }
        _ => tracing::info!("initial archive built successfully"),
    }

    let listener = TcpListener::bind(options.listen)
        .await
        .map_err(|e| io_err(options.listen.to_string(), e))?;

    let (shutdown_tx, _) = broadcast::channel::<()>(16);
    let (handle, commands) = CoreHandle::channel(64);

    let core_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let result = core_task(core, commands, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let watcher_handle = {
        let shutdown = shutdown_tx.clone();
        let root = workspace.root().to_path_buf();
        let core = handle.clone();
        let (quiet, stability) = (options.quiet_window, options.stability_window);
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let result = watcher_task(root, quiet, stability, core, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let core = handle.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let result = serve_sockets(listener, core, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let host_handle = {
        let shutdown = shutdown_tx.clone();
        let core = handle.clone();
        let socket = options.socket.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let Some(socket) = socket else {
                return Ok(());
            };
            let result = serve_host(socket, core, shutdown.clone(), shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };
    drop(handle);

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (core_result, watcher_result, socket_result, host_result, signal_result) = tokio::join!(
        core_handle,
        watcher_handle,
        socket_handle,
        host_handle,
        signal_handle
    );

    handle_join("core", core_result)?;
    handle_join("watcher", watcher_result)?;
    handle_join("websocket_server", socket_result)?;
    handle_join("host_channel", host_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}
