//! Error types for livesync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while packing or unpacking a workspace.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The packed container could not be read or written.
    #[error("archive container error: {0}")]
    Container(#[from] zip::result::ZipError),

    /// The manifest failed to parse as JSON at encode time.
    ///
    /// Recoverable: callers keep the previously published archive.
    #[error("JSON syntax error in project.json: {message}")]
    ManifestSyntax { message: String },

    /// A base64 payload from a host process could not be decoded.
    #[error("invalid base64 archive payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Errors from loading a [`crate::config::LiveSyncConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load, with the offending file.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Convenience constructor for [`CodecError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CodecError {
    CodecError::Io {
        path: path.into(),
        source,
    }
}
