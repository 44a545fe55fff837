//! Starter project copied into an empty workspace on first run.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use crate::codec::{GUIDE_NAME, MANIFEST_NAME};
use crate::error::{io_err, CodecError};

/// Files of the project template compiled into the binary.
pub const BUNDLED_TEMPLATE: &[(&str, &[u8])] = &[
    (
        MANIFEST_NAME,
        include_bytes!("../templates/default-project/project.json"),
    ),
    (
        "cd21514d0531fdffb22204e0ec5ed84a.svg",
        include_bytes!("../templates/default-project/cd21514d0531fdffb22204e0ec5ed84a.svg"),
    ),
];

/// Workspace guide shipped with the binary.
pub const BUNDLED_GUIDE: &[u8] = include_bytes!("../templates/default-project/LIVESYNC.md");

/// Where seed files come from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TemplateSource {
    /// The template compiled into the binary.
    #[default]
    Bundled,
    /// Every regular file directly inside a directory.
    Dir(PathBuf),
}

impl TemplateSource {
    pub fn from_option(dir: Option<PathBuf>) -> Self {
        dir.map(TemplateSource::Dir).unwrap_or_default()
    }

    /// Copy the template files into `dest`, returning the paths written.
    pub fn copy_into(&self, dest: &Path) -> Result<Vec<PathBuf>, CodecError> {
        fs::create_dir_all(dest).map_err(|e| io_err(dest, e))?;
        let mut written = Vec::new();
        match self {
            TemplateSource::Bundled => {
                for (name, content) in BUNDLED_TEMPLATE {
                    let path = dest.join(name);
                    fs::write(&path, content).map_err(|e| io_err(&path, e))?;
                    written.push(path);
                }
            }
            TemplateSource::Dir(dir) => {
                let mut entries: Vec<_> = fs::read_dir(dir)
                    .map_err(|e| io_err(dir, e))?
                    .filter_map(|e| e.ok())
                    .filter(|e| e.path().is_file())
                    .collect();
                entries.sort_by_key(|e| e.file_name());
                for entry in entries {
                    let path = dest.join(entry.file_name());
                    fs::copy(entry.path(), &path).map_err(|e| io_err(&path, e))?;
                    written.push(path);
                }
            }
        }
        Ok(written)
    }

    /// Contents of the workspace guide: the template directory's own copy when
    /// it has one, the bundled note otherwise.
    pub fn guide(&self) -> Result<Cow<'static, [u8]>, CodecError> {
        if let TemplateSource::Dir(dir) = self {
            let path = dir.join(GUIDE_NAME);
            if path.is_file() {
                let content = fs::read(&path).map_err(|e| io_err(&path, e))?;
                return Ok(Cow::Owned(content));
            }
        }
        Ok(Cow::Borrowed(BUNDLED_GUIDE))
    }
}
