//! SessionRegistry mapping numeric IDs to live sessions
//!
//! The table lock orders lookups against removal: a lookup that finds a
//! session takes its reference while still holding the read lock, so a
//! teardown that removes the entry afterwards will wait for that reference.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::{RwLock, Semaphore};
use tracing::debug;

use super::index_session::{IndexSession, IndexSessionRef, SessionId};
use crate::error::{SessionError, SessionResult};

/// First ID handed out by a fresh registry
pub const FIRST_SESSION_ID: SessionId = 1;

/// Table of registered index sessions
pub struct SessionRegistry {
    /// Registered sessions indexed by ID
    sessions: RwLock<HashMap<SessionId, Arc<IndexSession>>>,
    /// One permit per session that may exist at once
    slots: Arc<Semaphore>,
    max_sessions: usize,
    next_id: AtomicU32,
}

impl SessionRegistry {
    /// Create an empty registry allowing `max_sessions` live sessions
    pub fn new(max_sessions: usize) -> Self {
        let max_sessions = max_sessions.min(Semaphore::MAX_PERMITS);
        Self {
            sessions: RwLock::new(HashMap::new()),
            slots: Arc::new(Semaphore::new(max_sessions)),
            max_sessions,
            next_id: AtomicU32::new(FIRST_SESSION_ID),
        }
    }

    /// Maximum number of sessions that may exist at once
    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Build an unregistered session with a fresh ID
    ///
    /// Fails with [`SessionError::OutOfMemory`] when every slot is taken or
    /// the ID space is used up. Nothing is registered either way.
    pub fn allocate(&self) -> SessionResult<IndexSession> {
        let out_of_memory = || SessionError::OutOfMemory {
            limit: self.max_sessions,
        };

        let slot = Arc::clone(&self.slots)
            .try_acquire_owned()
            .map_err(|_| out_of_memory())?;
        let id = self
            .next_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |id| id.checked_add(1))
            .map_err(|_| out_of_memory())?;

        Ok(IndexSession::new(id, slot))
    }

    /// Make `session` visible to lookups
    pub async fn register(&self, session: Arc<IndexSession>) -> SessionResult<()> {
        let id = session.id();
        match self.sessions.write().await.entry(id) {
            Entry::Occupied(_) => Err(SessionError::DuplicateSession(id)),
            Entry::Vacant(entry) => {
                entry.insert(session);
                debug!(session_id = id, "Session registered");
                Ok(())
            }
        }
    }

    /// Look up a session and take a reference to it
    ///
    /// Fails with [`SessionError::InvalidSession`] if `id` is unknown or the
    /// session has already been unregistered.
    pub async fn get_index_session(&self, id: SessionId) -> SessionResult<IndexSessionRef> {
        let sessions = self.sessions.read().await;
        let session = sessions
            .get(&id)
            .ok_or(SessionError::InvalidSession(id))?;
        session.envelope().acquire();
        Ok(IndexSessionRef::acquired(Arc::clone(session)))
    }

    /// Remove `session` from the table
    ///
    /// Only removes the entry if it is this very session. Returns whether it
    /// did, so at most one caller ever wins the removal.
    pub async fn unregister(&self, session: &IndexSession) -> bool {
        let mut sessions = self.sessions.write().await;
        let is_entry = sessions
            .get(&session.id())
            .is_some_and(|entry| std::ptr::eq(Arc::as_ptr(entry), session));
        if is_entry {
            sessions.remove(&session.id());
            debug!(session_id = session.id(), "Session unregistered");
        }
        is_entry
    }

    /// Whether `id` is currently registered
    pub async fn contains(&self, id: SessionId) -> bool {
        self.sessions.read().await.contains_key(&id)
    }

    /// Number of registered sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no session is registered
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Registered sessions ordered by ID
    pub async fn snapshot(&self) -> Vec<Arc<IndexSession>> {
        let mut sessions: Vec<_> = self.sessions.read().await.values().cloned().collect();
        sessions.sort_by_key(|session| session.id());
        sessions
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_SESSIONS)
    }
}
