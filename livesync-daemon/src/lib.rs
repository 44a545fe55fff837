//! Live-sync daemon: workspace watcher + sync core + WebSocket and host transports.

mod error;
pub mod host;
pub mod protocol;
mod runtime;
pub mod session;
pub mod sync_core;
pub mod watcher;
pub mod ws;

pub use error::DaemonError;
pub use host::serve_host;
pub use protocol::{request_export, request_import, request_status, request_stop, send_request};
pub use runtime::{run, start_blocking, DaemonOptions};
pub use session::{Session, SessionId, SessionKind, SessionRegistry};
pub use sync_core::{spawn_core, ApplyOrigin, CoreHandle, CoreStatus, RebuildOutcome, SyncCore};
pub use watcher::{watcher_task, ChangeCoalescer, ChangeSignal};
pub use ws::serve_sockets;
