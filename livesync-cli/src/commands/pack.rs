//! `livesync pack` / `livesync unpack`: offline codec.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use livesync_core::Workspace;

use super::ConfigArgs;

#[derive(Args, Debug)]
pub struct PackArgs {
    /// Archive file to write.
    pub output: PathBuf,

    /// Workspace directory; defaults to the configured one.
    #[arg(long)]
    pub workspace: Option<PathBuf>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

impl PackArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.load()?;
        let root = self.workspace.unwrap_or_else(|| config.workspace.clone());
        let workspace = Workspace::new(&root).with_options(config.encode_options());

        let archive = workspace
            .encode()
            .with_context(|| format!("failed to pack {}", root.display()))?;
        fs::write(&self.output, archive.as_bytes())
            .with_context(|| format!("failed to write {}", self.output.display()))?;

        println!(
            "packed {} ({} bytes) into {}",
            root.display(),
            archive.len(),
            self.output.display()
        );
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct UnpackArgs {
    /// Archive file to read.
    pub archive: PathBuf,

    /// Workspace directory; defaults to the configured one.
    #[arg(long)]
    pub workspace: Option<PathBuf>,

    /// Remove existing top-level files first.
    #[arg(long)]
    pub fresh: bool,

    #[command(flatten)]
    pub config: ConfigArgs,
}

impl UnpackArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.load()?;
        let root = self.workspace.unwrap_or_else(|| config.workspace.clone());
        let workspace = Workspace::new(&root);

        let bytes = fs::read(&self.archive)
            .with_context(|| format!("failed to read {}", self.archive.display()))?;
        let report = if self.fresh {
            workspace.replace_with(&bytes)
        } else {
            workspace.decode(&bytes)
        }
        .with_context(|| format!("failed to unpack {}", self.archive.display()))?;

        for name in &report.skipped {
            eprintln!("skipped unsafe entry: {name}");
        }
        if !report.manifest_canonical {
            eprintln!("warning: project.json is not valid JSON; written unchanged");
        }
        println!(
            "unpacked {} file(s) into {}",
            report.written.len(),
            root.display()
        );
        Ok(())
    }
}
