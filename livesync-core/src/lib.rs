//! livesync core library: archive codec, workspace and shared primitives.
//!
//! - [`codec`]: directory ⇄ packed archive
//! - [`workspace`]: startup modes and template seeding
//! - [`debounce`]: trailing-edge event coalescing
//! - [`config`]: YAML configuration
//! - [`host`]: host-process wire types

pub mod archive;
pub mod codec;
pub mod config;
pub mod debounce;
pub mod error;
pub mod host;
pub mod logging;
pub mod template;
pub mod workspace;

pub use archive::Archive;
pub use codec::{decode, encode, DecodeReport, EncodeOptions, GUIDE_NAME, MANIFEST_NAME};
pub use config::LiveSyncConfig;
pub use debounce::Debouncer;
pub use error::{CodecError, ConfigError};
pub use template::TemplateSource;
pub use workspace::{Prepared, StartupMode, Workspace};
