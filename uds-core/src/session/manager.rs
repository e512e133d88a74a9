//! IndexSessionManager for opening, sharing, and tearing down sessions
//!
//! IndexSessionManager owns the session registry and uses a GridFactory for
//! dependency injection of grid implementations.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::index_session::{IndexSession, IndexSessionRef, SessionId};
use super::registry::SessionRegistry;
use super::state::IndexSessionState;
use crate::config::IndexSessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::grid::{Grid, GridFactory};

/// Point-in-time view of a registered session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub state: IndexSessionState,
    pub ref_count: usize,
}

/// Manages the index sessions of one service
///
/// IndexSessionManager provides:
/// - Session construction and grid opening
/// - Reference-counted lookup by numeric ID
/// - State queries and the readiness guard
/// - Save-and-free teardown that waits for outstanding references
pub struct IndexSessionManager {
    registry: SessionRegistry,
    grid_factory: Arc<dyn GridFactory>,
    config: IndexSessionConfig,
}

impl IndexSessionManager {
    /// Create a new IndexSessionManager
    pub fn new(grid_factory: Arc<dyn GridFactory>, config: IndexSessionConfig) -> Self {
        Self {
            registry: SessionRegistry::new(config.max_sessions),
            grid_factory,
            config,
        }
    }

    /// Configuration in effect
    pub fn config(&self) -> &IndexSessionConfig {
        &self.config
    }

    /// The registry backing this manager
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    // ===== Construction =====

    /// Construct a new, unregistered session in the `Init` state
    ///
    /// Fails with [`SessionError::OutOfMemory`] when no session slot is free.
    pub fn make_empty_index_session(&self) -> SessionResult<Arc<IndexSession>> {
        Ok(Arc::new(self.registry.allocate()?))
    }

    /// Create a grid called `name` and open a session on it
    ///
    /// Returns the session ID.
    pub async fn open_index_session(&self, name: &str) -> SessionResult<SessionId> {
        let grid = self.grid_factory.create(name);
        self.open_index_session_with_grid(grid).await
    }

    /// Open a session on an existing grid
    ///
    /// The session is registered in `Init` while the grid opens and moves to
    /// `Ready` once it has. If anything fails the session is disabled,
    /// unregistered, and freed, and the error is returned unchanged.
    pub async fn open_index_session_with_grid(
        &self,
        grid: Box<dyn Grid>,
    ) -> SessionResult<SessionId> {
        let session = self.make_empty_index_session()?;
        let id = session.id();
        let name = grid.name().to_string();
        self.registry.register(Arc::clone(&session)).await?;

        match self.attach_grid(&session, grid).await {
            Ok(()) => {
                info!(session_id = id, grid = %name, "Index session opened");
                Ok(id)
            }
            Err(error) => {
                warn!(session_id = id, grid = %name, %error, "Failed to open index session");
                session.disable();
                self.registry.unregister(&session).await;
                // Nothing to save; only the close matters here
                let _ = self.drain_and_close(&session, false).await;
                Err(error)
            }
        }
    }

    async fn attach_grid(&self, session: &IndexSession, grid: Box<dyn Grid>) -> SessionResult<()> {
        grid.open().await?;

        if let Some(frequency) = self.config.default_checkpoint_frequency
            && let Err(error) = grid.set_checkpoint_frequency(frequency).await
        {
            grid.close().await;
            return Err(error.into());
        }

        session.install_grid(grid).await;
        session.set_state(IndexSessionState::Ready)
    }

    // ===== Acquire / Release =====

    /// Look up a session by ID and take a reference to it
    ///
    /// The reference must be handed back through
    /// [`release_index_session`](Self::release_index_session) or dropped.
    pub async fn get_index_session(&self, id: SessionId) -> SessionResult<IndexSessionRef> {
        self.registry.get_index_session(id).await
    }

    /// Release a reference taken by [`get_index_session`](Self::get_index_session)
    pub fn release_index_session(&self, session: IndexSessionRef) {
        session.release();
    }

    // ===== State =====

    /// Check that the session is usable
    pub fn check_index_session(&self, session: &IndexSessionRef) -> SessionResult<()> {
        session.check()
    }

    /// Get the current state of a session
    pub fn get_index_session_state(&self, session: &IndexSessionRef) -> IndexSessionState {
        session.state()
    }

    /// Set the state of a session
    ///
    /// A disabled session stays disabled.
    pub fn set_index_session_state(
        &self,
        session: &IndexSessionRef,
        state: IndexSessionState,
    ) -> SessionResult<()> {
        session.set_state(state)
    }

    // ===== Grid Operations =====

    /// Set the checkpoint frequency of the grid behind session `id`
    pub async fn set_checkpoint_frequency(
        &self,
        id: SessionId,
        frequency: u32,
    ) -> SessionResult<()> {
        let session = self.get_index_session(id).await?;
        let result = session.set_checkpoint_frequency(frequency).await;
        self.release_index_session(session);
        result
    }

    // ===== Teardown =====

    /// Save the grid and free the session
    ///
    /// Consumes the caller's reference. The session is disabled and
    /// unregistered first, then this waits for every other reference to be
    /// released before saving and closing the grid. A save failure is
    /// returned, but the grid is closed and the session freed regardless.
    ///
    /// Fails with [`SessionError::InvalidSession`] if another teardown of
    /// the same session got there first.
    pub async fn save_and_free_index_session(&self, session: IndexSessionRef) -> SessionResult<()> {
        let session_arc = Arc::clone(session.session());
        let id = session_arc.id();

        session_arc.disable();
        if !self.registry.unregister(&session_arc).await {
            session.release();
            return Err(SessionError::InvalidSession(id));
        }
        session.release();

        info!(
            session_id = id,
            outstanding = session_arc.ref_count(),
            "Saving and freeing index session"
        );
        let result = self.drain_and_close(&session_arc, true).await;
        info!(session_id = id, "Index session closed");
        result
    }

    /// Look up session `id` and save-and-free it
    pub async fn close_index_session(&self, id: SessionId) -> SessionResult<()> {
        let session = self.get_index_session(id).await?;
        self.save_and_free_index_session(session).await
    }

    async fn drain_and_close(&self, session: &IndexSession, save: bool) -> SessionResult<()> {
        session.envelope().request_teardown();
        session
            .envelope()
            .wait_for_drain(self.config.drain_warn_interval)
            .await;

        let Some(grid) = session.take_grid().await else {
            return Ok(());
        };

        let saved = if save { grid.save().await } else { Ok(()) };
        if let Err(error) = &saved {
            warn!(session_id = session.id(), %error, "Grid save failed, closing anyway");
        }
        grid.close().await;
        saved.map_err(SessionError::from)
    }

    // ===== Queries =====

    /// List registered sessions with their states
    pub async fn list_sessions(&self) -> Vec<SessionInfo> {
        self.registry
            .snapshot()
            .await
            .iter()
            .map(|session| SessionInfo {
                id: session.id(),
                state: session.state(),
                ref_count: session.ref_count(),
            })
            .collect()
    }

    /// Get the number of registered sessions
    pub async fn session_count(&self) -> usize {
        self.registry.len().await
    }

    /// Close every registered session
    ///
    /// Every session is freed even if some saves fail; the first failure is
    /// returned. Fails with [`SessionError::ShutdownIncomplete`] if sessions
    /// were opened while the shutdown ran.
    pub async fn shutdown(&self) -> SessionResult<()> {
        let ids: Vec<SessionId> = self
            .registry
            .snapshot()
            .await
            .iter()
            .map(|session| session.id())
            .collect();
        info!(sessions = ids.len(), "Shutting down index sessions");

        let mut first_error = None;
        for id in ids {
            match self.close_index_session(id).await {
                Ok(()) | Err(SessionError::InvalidSession(_)) => {}
                Err(error) => {
                    first_error.get_or_insert(error);
                }
            }
        }

        if let Some(error) = first_error {
            return Err(error);
        }

        let remaining = self.registry.len().await;
        if remaining != 0 {
            return Err(SessionError::ShutdownIncomplete { remaining });
        }
        Ok(())
    }
}
