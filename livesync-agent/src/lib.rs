//! Editor-side sync agents.
//!
//! [`PushAgent`] follows a daemon's WebSocket and reloads the editor on every
//! archive. [`BridgeAgent`] talks to a host process in both directions with
//! echo suppression.

mod bidi;
pub mod echo;
mod editor;
mod error;
pub mod host;
mod mirror;
mod push;
mod reload;

pub use bidi::{BridgeAgent, BridgeTimings};
pub use echo::{EchoGuard, EchoState};
pub use editor::Editor;
pub use error::AgentError;
pub use host::{HostChannel, SocketHost};
pub use mirror::DirectoryEditor;
pub use push::{ConnectionState, PushAgent};
pub use reload::reload_preserving_selection;
