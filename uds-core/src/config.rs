//! Configuration for the index session manager.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default number of sessions that may exist at once.
pub const DEFAULT_MAX_SESSIONS: usize = 64;

/// File name looked up under the config directory.
pub const CONFIG_FILE_NAME: &str = "session.toml";

/// Settings for [`IndexSessionManager`](crate::session::IndexSessionManager).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSessionConfig {
    /// Maximum number of sessions alive at once.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Checkpoint frequency applied to every grid when it is opened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_checkpoint_frequency: Option<u32>,

    /// How often a teardown logs that it is still waiting for references.
    #[serde(default = "default_drain_warn_interval", with = "humantime_serde")]
    pub drain_warn_interval: Duration,
}

fn default_max_sessions() -> usize {
    DEFAULT_MAX_SESSIONS
}

fn default_drain_warn_interval() -> Duration {
    Duration::from_secs(5)
}

impl Default for IndexSessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            default_checkpoint_frequency: None,
            drain_warn_interval: default_drain_warn_interval(),
        }
    }
}

impl IndexSessionConfig {
    /// Create a new config with a custom session limit.
    #[must_use]
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    /// Create a new config applying `frequency` to newly opened grids.
    #[must_use]
    pub fn with_default_checkpoint_frequency(mut self, frequency: u32) -> Self {
        self.default_checkpoint_frequency = Some(frequency);
        self
    }

    /// Create a new config with a custom drain warning interval.
    #[must_use]
    pub fn with_drain_warn_interval(mut self, interval: Duration) -> Self {
        self.drain_warn_interval = interval;
        self
    }

    /// Parse a config from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Read a config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load the user config file if there is one, defaults otherwise.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(path),
            _ => Ok(Self::default()),
        }
    }

    /// Where [`load`](Self::load) looks for the config file.
    ///
    /// `$XDG_CONFIG_HOME/uds/session.toml` if set, otherwise
    /// `~/.config/uds/session.toml`.
    pub fn default_path() -> Option<PathBuf> {
        let base = match std::env::var_os("XDG_CONFIG_HOME") {
            Some(xdg_config) => PathBuf::from(xdg_config),
            None => dirs::home_dir()?.join(".config"),
        };
        Some(base.join("uds").join(CONFIG_FILE_NAME))
    }

    /// Render the config as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
