//! uds-core: Index session handles for the uds deduplication index
//!
//! An index session is the handle through which a client opens, checkpoints,
//! and closes a grid. This crate provides:
//!
//! - **State cell** - [`SessionStateCell`] holding the [`IndexSessionState`] in an atomic
//! - **Session envelope** - [`SessionEnvelope`] counting references and signalling drains
//! - **Registry** - [`SessionRegistry`] mapping numeric IDs to sessions
//! - **Manager** - [`IndexSessionManager`] with open, acquire, release, and save-and-free
//! - **Grids** - the [`Grid`] trait and the in-memory [`MemoryGrid`]
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use uds_core::{IndexSessionConfig, IndexSessionManager, MemoryGridFactory};
//!
//! async fn example() -> Result<(), uds_core::SessionError> {
//!     let manager = IndexSessionManager::new(
//!         Arc::new(MemoryGridFactory::new()),
//!         IndexSessionConfig::default(),
//!     );
//!
//!     let id = manager.open_index_session("volume-0").await?;
//!
//!     let session = manager.get_index_session(id).await?;
//!     session.set_checkpoint_frequency(32).await?;
//!     manager.release_index_session(session);
//!
//!     manager.close_index_session(id).await
//! }
//! ```
//!
//! # Teardown
//!
//! ```text
//!  save_and_free
//!    ├─ state := Disabled        new operations fail the readiness guard
//!    ├─ unregister               new lookups fail with InvalidSession
//!    ├─ wait for ref_count == 0  in-flight operations finish
//!    ├─ grid.save()              failure is reported, not fatal
//!    └─ grid.close(), free
//! ```

pub mod config;
pub mod error;
pub mod grid;
pub mod session;

// Re-export key types for convenience
pub use config::IndexSessionConfig;
pub use error::{ConfigError, GridError, SessionError, SessionResult, UdsError};
pub use grid::{Grid, GridFactory, GridProbe, MemoryGrid, MemoryGridFactory};
pub use session::{
    IndexSession, IndexSessionManager, IndexSessionRef, IndexSessionState, SessionEnvelope,
    SessionId, SessionInfo, SessionRegistry, SessionStateCell,
};
