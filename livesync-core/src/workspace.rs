//! The directory form of a project and how it is prepared at startup.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use crate::archive::Archive;
use crate::codec::{self, DecodeReport, EncodeOptions, GUIDE_NAME, MANIFEST_NAME};
use crate::error::{io_err, CodecError};
use crate::template::TemplateSource;

/// A workspace directory plus the options used to pack it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
    options: EncodeOptions,
}

/// How the workspace is brought into existence when the daemon starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupMode {
    /// Decode this archive into a fresh workspace, replacing prior contents.
    FromArchive(PathBuf),
    /// No archive and no manifest: copy the template in.
    Seed(TemplateSource),
    /// No archive but a manifest already exists: use the workspace as-is.
    Existing,
}

/// What [`Workspace::prepare`] ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prepared {
    Imported(DecodeReport),
    Seeded(Vec<PathBuf>),
    Existing,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            options: EncodeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EncodeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_NAME)
    }

    pub fn has_manifest(&self) -> bool {
        self.manifest_path().is_file()
    }

    /// Pack the current directory contents.
    pub fn encode(&self) -> Result<Archive, CodecError> {
        codec::encode(&self.root, &self.options)
    }

    /// Unpack `archive` over the current contents.
    pub fn decode(&self, archive: &[u8]) -> Result<DecodeReport, CodecError> {
        codec::decode(&self.root, archive)
    }

    /// Remove every top-level regular file except the guide, then unpack `archive`.
    ///
    /// The archive is opened before anything is removed, so an unreadable
    /// container leaves the workspace untouched.
    pub fn replace_with(&self, archive: &[u8]) -> Result<DecodeReport, CodecError> {
        zip::ZipArchive::new(std::io::Cursor::new(archive))?;
        if self.root.exists() {
            for entry in fs::read_dir(&self.root).map_err(|e| io_err(&self.root, e))? {
                let path = entry.map_err(|e| io_err(&self.root, e))?.path();
                if path.is_file() && path.file_name() != Some(OsStr::new(GUIDE_NAME)) {
                    fs::remove_file(&path).map_err(|e| io_err(&path, e))?;
                }
            }
        }
        self.decode(archive)
    }

    /// Copy the template in unless a manifest is already present.
    ///
    /// Returns an empty list when seeding was skipped.
    pub fn seed_from_template(&self, template: &TemplateSource) -> Result<Vec<PathBuf>, CodecError> {
        if self.has_manifest() {
            tracing::info!("project.json already exists, skipping template copy");
            return Ok(Vec::new());
        }
        let written = template.copy_into(&self.root)?;
        tracing::info!(files = written.len(), root = %self.root.display(), "seeded workspace from template");
        Ok(written)
    }

    /// Write the workspace guide, replacing whatever copy is there.
    pub fn refresh_guide(&self, template: &TemplateSource) -> Result<PathBuf, CodecError> {
        fs::create_dir_all(&self.root).map_err(|e| io_err(&self.root, e))?;
        let path = self.root.join(GUIDE_NAME);
        codec::atomic_write(&path, &template.guide()?)?;
        tracing::debug!(path = %path.display(), "refreshed workspace guide");
        Ok(path)
    }

    /// Pick the startup mode for an optional source archive.
    pub fn startup_mode(&self, archive: Option<PathBuf>, template: TemplateSource) -> StartupMode {
        match archive {
            Some(path) => StartupMode::FromArchive(path),
            None if self.has_manifest() => StartupMode::Existing,
            None => StartupMode::Seed(template),
        }
    }

    /// Bring the workspace into the state `mode` asks for.
    pub fn prepare(&self, mode: &StartupMode) -> Result<Prepared, CodecError> {
        match mode {
            StartupMode::FromArchive(path) => {
                let bytes = fs::read(path).map_err(|e| io_err(path, e))?;
                Ok(Prepared::Imported(self.replace_with(&bytes)?))
            }
            StartupMode::Seed(template) => Ok(Prepared::Seeded(self.seed_from_template(template)?)),
            StartupMode::Existing => {
                fs::create_dir_all(&self.root).map_err(|e| io_err(&self.root, e))?;
                Ok(Prepared::Existing)
            }
        }
    }
}
