//! `livesync serve`: run the daemon in the foreground.

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use livesync_daemon::{start_blocking, DaemonOptions};

use super::ConfigArgs;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Archive to import at startup; replaces the workspace contents.
    pub archive: Option<PathBuf>,

    /// Workspace directory.
    #[arg(long)]
    pub workspace: Option<PathBuf>,

    /// Template directory used to seed an empty workspace.
    #[arg(long)]
    pub template: Option<PathBuf>,

    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// WebSocket port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Host-channel Unix socket.
    #[arg(long)]
    pub socket: Option<PathBuf>,

    /// Serve WebSocket observers only.
    #[arg(long)]
    pub no_host: bool,

    /// Log one JSON object per line.
    #[arg(long)]
    pub log_json: bool,

    #[command(flatten)]
    pub config: ConfigArgs,
}

impl ServeArgs {
    pub fn run(self) -> Result<()> {
        let mut config = self.config.load()?;
        if let Some(workspace) = self.workspace {
            config.workspace = workspace;
        }
        if let Some(template) = self.template {
            config.template = Some(template);
        }
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(socket) = self.socket {
            config.socket = Some(socket);
        }

        let mut options =
            DaemonOptions::from_config(&config).context("failed to resolve daemon options")?;
        options.source_archive = self.archive;
        if self.no_host {
            options.socket = None;
        }
        options.json_logs = self.log_json;

        start_blocking(options).context("daemon exited with error")
    }
}
