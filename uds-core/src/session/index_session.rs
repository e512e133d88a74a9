//! IndexSession and the counted reference handed out by the registry

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, RwLock, RwLockReadGuard};
use tracing::debug;

use super::envelope::SessionEnvelope;
use super::state::{IndexSessionState, SessionStateCell};
use crate::error::{SessionError, SessionResult};
use crate::grid::Grid;

/// Numeric identifier clients use to name a session
pub type SessionId = u32;

/// A session over one grid
///
/// IndexSession holds:
/// - The lifecycle state, readable without locking
/// - The reference count and drain signal
/// - The grid, present from a successful open until teardown
/// - The registry capacity slot it occupies, returned when dropped
pub struct IndexSession {
    id: SessionId,
    state: SessionStateCell,
    envelope: SessionEnvelope,
    grid: RwLock<Option<Box<dyn Grid>>>,
    _slot: OwnedSemaphorePermit,
}

impl IndexSession {
    /// Create an unregistered session in the `Init` state with no grid
    pub(crate) fn new(id: SessionId, slot: OwnedSemaphorePermit) -> Self {
        Self {
            id,
            state: SessionStateCell::new(IndexSessionState::Init),
            envelope: SessionEnvelope::new(),
            grid: RwLock::new(None),
            _slot: slot,
        }
    }

    /// Get the session ID
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Get current session state
    pub fn state(&self) -> IndexSessionState {
        self.state.load()
    }

    /// Move the session to `state`
    ///
    /// Fails with [`SessionError::InvalidStateTransition`] when asked to
    /// leave `Disabled`.
    pub fn set_state(&self, state: IndexSessionState) -> SessionResult<()> {
        let previous = self.state.transition(state)?;
        if previous != state {
            debug!(session_id = self.id, from = %previous, to = %state, "Session state changed");
        }
        Ok(())
    }

    /// Disable the session permanently
    pub fn disable(&self) {
        let previous = self.state.load();
        self.state.store(IndexSessionState::Disabled);
        if previous != IndexSessionState::Disabled {
            debug!(session_id = self.id, from = %previous, "Session disabled");
        }
    }

    /// Check that the session is usable
    pub fn check(&self) -> SessionResult<()> {
        self.state.check()
    }

    /// Number of references currently held
    pub fn ref_count(&self) -> usize {
        self.envelope.ref_count()
    }

    /// Whether a save-and-free is waiting on this session
    pub fn is_teardown_requested(&self) -> bool {
        self.envelope.is_teardown_requested()
    }

    /// Whether a grid is currently attached
    pub async fn has_grid(&self) -> bool {
        self.grid.read().await.is_some()
    }

    pub(crate) fn envelope(&self) -> &SessionEnvelope {
        &self.envelope
    }

    pub(crate) async fn install_grid(&self, grid: Box<dyn Grid>) {
        *self.grid.write().await = Some(grid);
    }

    pub(crate) async fn take_grid(&self) -> Option<Box<dyn Grid>> {
        self.grid.write().await.take()
    }
}

impl fmt::Debug for IndexSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexSession")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("ref_count", &self.ref_count())
            .finish_non_exhaustive()
    }
}

impl Drop for IndexSession {
    fn drop(&mut self) {
        debug!(session_id = self.id, "Index session freed");
    }
}

/// A counted reference to a registered [`IndexSession`]
///
/// Only the registry creates these, and only while the session is
/// registered. The reference is released exactly once, either through
/// [`release`](Self::release) or when it is dropped.
pub struct IndexSessionRef {
    session: Arc<IndexSession>,
}

impl IndexSessionRef {
    /// Wrap a session whose count has already been incremented
    pub(crate) fn acquired(session: Arc<IndexSession>) -> Self {
        Self { session }
    }

    /// Release this reference
    pub fn release(self) {
        drop(self);
    }

    /// Borrow the grid for as long as this reference is held
    ///
    /// Fails with [`SessionError::SessionNotReady`] if no grid is attached.
    pub async fn grid(&self) -> SessionResult<RwLockReadGuard<'_, dyn Grid>> {
        let guard = self.session.grid.read().await;
        RwLockReadGuard::try_map(guard, |grid| grid.as_deref())
            .map_err(|_| SessionError::SessionNotReady)
    }

    /// Set the checkpoint frequency of the grid
    ///
    /// The session must be `Ready`; grid errors are returned unchanged.
    pub async fn set_checkpoint_frequency(&self, frequency: u32) -> SessionResult<()> {
        self.session.check()?;
        let grid = self.grid().await?;
        grid.set_checkpoint_frequency(frequency).await?;
        debug!(session_id = self.session.id, frequency, "Checkpoint frequency set");
        Ok(())
    }

    pub(crate) fn session(&self) -> &Arc<IndexSession> {
        &self.session
    }
}

impl Deref for IndexSessionRef {
    type Target = IndexSession;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl fmt::Debug for IndexSessionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IndexSessionRef").field(&self.session).finish()
    }
}

impl Drop for IndexSessionRef {
    fn drop(&mut self) {
        self.session.envelope.release();
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::Semaphore;

    use super::*;
    use crate::grid::MemoryGrid;

    fn empty_session(id: SessionId) -> Arc<IndexSession> {
        let slot = Arc::new(Semaphore::new(1)).try_acquire_owned().unwrap();
        Arc::new(IndexSession::new(id, slot))
    }

    fn acquire(session: &Arc<IndexSession>) -> IndexSessionRef {
        session.envelope().acquire();
        IndexSessionRef::acquired(Arc::clone(session))
    }

    // ==================== Creation Tests ====================

    #[tokio::test]
    async fn new_session_starts_empty_in_init() {
        let session = empty_session(7);

        assert_eq!(session.id(), 7);
        assert_eq!(session.state(), IndexSessionState::Init);
        assert_eq!(session.ref_count(), 0);
        assert!(!session.has_grid().await);
    }

    #[test]
    fn debug_output_includes_id_and_state() {
        let session = empty_session(3);
        let debug = format!("{:?}", session);
        assert!(debug.contains("IndexSession"));
        assert!(debug.contains("Init"));
    }

    // ==================== State Tests ====================

    #[test]
    fn disable_is_permanent() {
        let session = empty_session(1);
        session.set_state(IndexSessionState::Ready).unwrap();

        session.disable();
        session.disable();

        assert_eq!(session.state(), IndexSessionState::Disabled);
        assert!(matches!(session.check(), Err(SessionError::SessionDisabled)));
    }

    #[test]
    fn set_state_cannot_leave_disabled() {
        let session = empty_session(1);
        session.set_state(IndexSessionState::Disabled).unwrap();

        let result = session.set_state(IndexSessionState::Ready);

        assert!(result.is_err());
        assert_eq!(session.state(), IndexSessionState::Disabled);
    }

    // ==================== Reference Tests ====================

    #[test]
    fn dropping_reference_releases_count() {
        let session = empty_session(1);

        let first = acquire(&session);
        let second = acquire(&session);
        assert_eq!(session.ref_count(), 2);

        first.release();
        assert_eq!(session.ref_count(), 1);
        drop(second);
        assert_eq!(session.ref_count(), 0);
    }

    #[tokio::test]
    async fn grid_access_without_grid_is_not_ready() {
        let session = empty_session(1);
        let handle = acquire(&session);

        assert!(matches!(
            handle.grid().await,
            Err(SessionError::SessionNotReady)
        ));
    }

    #[tokio::test]
    async fn grid_access_borrows_installed_grid() {
        let session = empty_session(1);
        session.install_grid(Box::new(MemoryGrid::new("vol"))).await;
        let handle = acquire(&session);

        let grid = handle.grid().await.unwrap();
        assert_eq!(grid.name(), "vol");
    }

    // ==================== Checkpoint Tests ====================

    #[tokio::test]
    async fn checkpoint_frequency_on_init_session_is_not_ready() {
        let session = empty_session(1);
        let handle = acquire(&session);

        let result = handle.set_checkpoint_frequency(10).await;

        assert!(matches!(result, Err(SessionError::SessionNotReady)));
    }

    #[tokio::test]
    async fn checkpoint_frequency_forwards_to_ready_grid() {
        let session = empty_session(1);
        let grid = MemoryGrid::new("vol");
        let probe = grid.probe();
        grid.open().await.unwrap();
        session.install_grid(Box::new(grid)).await;
        session.set_state(IndexSessionState::Ready).unwrap();
        let handle = acquire(&session);

        handle.set_checkpoint_frequency(12).await.unwrap();

        assert_eq!(probe.checkpoint_frequency(), 12);
        assert_eq!(session.state(), IndexSessionState::Ready);
    }

    #[tokio::test]
    async fn take_grid_detaches_it() {
        let session = empty_session(1);
        session.install_grid(Box::new(MemoryGrid::new("vol"))).await;

        let grid = session.take_grid().await;

        assert!(grid.is_some());
        assert!(!session.has_grid().await);
    }
}
