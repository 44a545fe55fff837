//! `livesync status|stop|import|export`: talk to a running daemon.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;

use livesync_daemon::{request_export, request_import, request_status, request_stop, DaemonError};

use super::{absolute, ConfigArgs};

/// Socket selection shared by the control commands.
#[derive(Args, Debug, Clone, Default)]
pub struct SocketArgs {
    /// Host-channel Unix socket of the daemon.
    #[arg(long)]
    pub socket: Option<PathBuf>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

impl SocketArgs {
    fn resolve(&self) -> Result<PathBuf> {
        if let Some(socket) = &self.socket {
            return Ok(socket.clone());
        }
        self.config
            .load()?
            .socket_path()
            .context("could not determine host socket path")
    }
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub socket: SocketArgs,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let socket = self.socket.resolve()?;
        let payload = match request_status(&socket) {
            Ok(status) => status,
            Err(DaemonError::DaemonNotRunning { .. }) => serde_json::json!({
                "running": false,
                "socket": socket.display().to_string(),
            }),
            Err(err) => return Err(err).context("failed to query daemon status"),
        };
        print_json(&payload)
    }
}

#[derive(Args, Debug)]
pub struct StopArgs {
    #[command(flatten)]
    pub socket: SocketArgs,
}

impl StopArgs {
    pub fn run(self) -> Result<()> {
        let socket = self.socket.resolve()?;
        match request_stop(&socket) {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => println!("daemon is not running"),
            Err(err) => return Err(err).context("failed to stop daemon"),
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Archive file to load into the workspace.
    pub archive: PathBuf,

    #[command(flatten)]
    pub socket: SocketArgs,
}

impl ImportArgs {
    pub fn run(self) -> Result<()> {
        let socket = self.socket.resolve()?;
        let archive = absolute(self.archive)?;
        let result = request_import(&socket, archive.clone())
            .with_context(|| format!("failed to import {}", archive.display()))?;
        print_json(&result)
    }
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Archive file to write.
    pub output: PathBuf,

    #[command(flatten)]
    pub socket: SocketArgs,
}

impl ExportArgs {
    pub fn run(self) -> Result<()> {
        let socket = self.socket.resolve()?;
        let output = absolute(self.output)?;
        let result = request_export(&socket, output.clone())
            .with_context(|| format!("failed to export to {}", output.display()))?;
        print_json(&result)
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to render JSON")?
    );
    Ok(())
}
