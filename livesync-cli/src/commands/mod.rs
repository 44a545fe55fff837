pub mod control;
pub mod follow;
pub mod pack;
pub mod serve;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use livesync_core::LiveSyncConfig;

/// `--config` shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// YAML config file; defaults apply when absent.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<LiveSyncConfig> {
        LiveSyncConfig::load(self.config.as_deref()).context("failed to load config")
    }
}

/// Resolve `path` against the current directory so a daemon running
/// elsewhere sees the same file.
pub fn absolute(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path);
    }
    let cwd = std::env::current_dir().context("could not determine current directory")?;
    Ok(cwd.join(path))
}
