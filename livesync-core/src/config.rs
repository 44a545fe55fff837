//! YAML configuration shared by the daemon, the agents and the CLI.
//!
//! Every field has a default, so an absent file (or an empty one) yields a
//! working setup. CLI flags are applied on top by the binary.
//!
//! ```yaml
//! workspace: ./workspace
//! port: 3333
//! # keep notes next to the project without packing them
//! ignore_suffixes: [".md"]
//! watch:
//!   quiet_window_ms: 200
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::EncodeOptions;
use crate::error::ConfigError;

pub const DEFAULT_PORT: u16 = 3333;
pub const SOCKET_FILE: &str = "host.sock";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LiveSyncConfig {
    pub workspace: PathBuf,
    /// Template directory; the bundled template is used when unset.
    pub template: Option<PathBuf>,
    pub bind: IpAddr,
    pub port: u16,
    /// Host-process socket; `~/.livesync/host.sock` when unset.
    pub socket: Option<PathBuf>,
    /// File-name suffixes left out of every archive. Empty by default.
    pub ignore_suffixes: Vec<String>,
    /// How long after a host save an identical rebuild is not re-broadcast.
    pub echo_window_ms: u64,
    pub watch: WatchConfig,
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    pub quiet_window_ms: u64,
    pub stability_window_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    pub save_debounce_ms: u64,
    pub settle_grace_ms: u64,
    pub reconnect_delay_ms: u64,
}

impl Default for LiveSyncConfig {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("workspace"),
            template: None,
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            socket: None,
            ignore_suffixes: Vec::new(),
            echo_window_ms: 1000,
            watch: WatchConfig::default(),
            agent: AgentConfig::default(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            quiet_window_ms: 200,
            stability_window_ms: 300,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            save_debounce_ms: 500,
            settle_grace_ms: 1000,
            reconnect_delay_ms: 2000,
        }
    }
}

impl WatchConfig {
    pub fn quiet_window(&self) -> Duration {
        Duration::from_millis(self.quiet_window_ms)
    }

    pub fn stability_window(&self) -> Duration {
        Duration::from_millis(self.stability_window_ms)
    }
}

impl AgentConfig {
    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    pub fn settle_grace(&self) -> Duration {
        Duration::from_millis(self.settle_grace_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl LiveSyncConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file absent, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_at(path),
            None => Ok(Self::default()),
        }
    }

    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            ignore_suffixes: self.ignore_suffixes.clone(),
        }
    }

    pub fn echo_window(&self) -> Duration {
        Duration::from_millis(self.echo_window_ms)
    }

    /// Socket path, falling back to `~/.livesync/host.sock`.
    pub fn socket_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.socket {
            Some(path) => Ok(path.clone()),
            None => {
                let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
                Ok(default_socket_path_at(&home))
            }
        }
    }
}

/// `<home>/.livesync/host.sock`. Pure, no I/O.
pub fn default_socket_path_at(home: &Path) -> PathBuf {
    home.join(".livesync").join(SOCKET_FILE)
}
