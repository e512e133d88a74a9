//! Error types for uds-core

use thiserror::Error;

use crate::session::{IndexSessionState, SessionId};

/// Top-level error type for uds-core
#[derive(Error, Debug)]
pub enum UdsError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Grid error: {0}")]
    Grid(#[from] GridError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors related to index session handling
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid session: {0}")]
    InvalidSession(SessionId),

    #[error("Session not ready")]
    SessionNotReady,

    #[error("Session disabled")]
    SessionDisabled,

    #[error("Out of memory: no session slot available (limit {limit})")]
    OutOfMemory { limit: usize },

    #[error("Session {0} is already registered")]
    DuplicateSession(SessionId),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        from: IndexSessionState,
        to: IndexSessionState,
    },

    #[error("Shutdown left {remaining} session(s) registered")]
    ShutdownIncomplete { remaining: usize },

    #[error("Grid error: {0}")]
    Grid(#[from] GridError),
}

/// Result alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors reported by a grid
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("Failed to open grid {name}: {reason}")]
    OpenFailed { name: String, reason: String },

    #[error("Failed to save grid {name}: {reason}")]
    SaveFailed { name: String, reason: String },

    #[error("Invalid checkpoint frequency {frequency} (maximum {maximum})")]
    InvalidCheckpointFrequency { frequency: u32, maximum: u32 },

    #[error("Grid {0} is not open")]
    NotOpen(String),
}

/// Errors loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
