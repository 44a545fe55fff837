//! `livesync follow`: push-only agent mirroring into a directory.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio::sync::broadcast;

use livesync_agent::{DirectoryEditor, PushAgent};

use super::ConfigArgs;

#[derive(Args, Debug)]
pub struct FollowArgs {
    /// Daemon WebSocket URL; defaults to the configured bind address and port.
    pub url: Option<String>,

    /// Directory that mirrors every received archive.
    #[arg(long)]
    pub into: PathBuf,

    /// Delay between reconnection attempts.
    #[arg(long)]
    pub reconnect_ms: Option<u64>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

impl FollowArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.load()?;
        let url = self
            .url
            .unwrap_or_else(|| format!("ws://{}", SocketAddr::new(config.bind, config.port)));
        let delay = self
            .reconnect_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| config.agent.reconnect_delay());

        livesync_core::logging::init_tracing();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start tokio runtime")?;

        runtime.block_on(async move {
            let editor = Arc::new(DirectoryEditor::new(self.into));
            let agent = PushAgent::new(url.clone(), editor, delay);
            let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("received ctrl-c, shutting down");
                    let _ = shutdown_tx.send(());
                }
            });
            tracing::info!(%url, "following daemon");
            agent.run(shutdown_rx).await
        })
        .context("follow agent exited with error")
    }
}
