//! Index session state and the atomic cell holding it
//!
//! The state is read on every operation without taking a lock, so it lives
//! in an [`AtomicU8`] and is decoded back into [`IndexSessionState`] on
//! each load.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};

/// Lifecycle state of an index session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum IndexSessionState {
    /// Constructed, grid not yet usable
    Init = 1,
    /// Grid open, accepting operations
    Ready = 2,
    /// Grid unusable; permanent once entered
    Disabled = 3,
}

impl IndexSessionState {
    /// Get the state name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Ready => "ready",
            Self::Disabled => "disabled",
        }
    }

    fn as_repr(self) -> u8 {
        self as u8
    }

    // The cell only ever stores values produced by `as_repr`.
    fn from_repr(raw: u8) -> Self {
        match raw {
            1 => Self::Init,
            2 => Self::Ready,
            _ => Self::Disabled,
        }
    }
}

impl fmt::Display for IndexSessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomically updated [`IndexSessionState`]
#[derive(Debug)]
pub struct SessionStateCell {
    raw: AtomicU8,
}

impl SessionStateCell {
    /// Create a cell holding `state`
    pub fn new(state: IndexSessionState) -> Self {
        Self {
            raw: AtomicU8::new(state.as_repr()),
        }
    }

    /// Read the current state with a single atomic load
    pub fn load(&self) -> IndexSessionState {
        IndexSessionState::from_repr(self.raw.load(Ordering::Acquire))
    }

    /// Overwrite the state with a single atomic store
    ///
    /// This does not enforce monotonicity; prefer [`transition`](Self::transition)
    /// unless the caller has exclusive control of the session.
    pub fn store(&self, state: IndexSessionState) {
        self.raw.store(state.as_repr(), Ordering::Release);
    }

    /// Move to `next`, refusing to leave [`IndexSessionState::Disabled`]
    ///
    /// Returns the state observed before the transition.
    pub fn transition(&self, next: IndexSessionState) -> SessionResult<IndexSessionState> {
        self.raw
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                match IndexSessionState::from_repr(raw) {
                    IndexSessionState::Disabled if next != IndexSessionState::Disabled => None,
                    IndexSessionState::Init
                    | IndexSessionState::Ready
                    | IndexSessionState::Disabled => Some(next.as_repr()),
                }
            })
            .map(IndexSessionState::from_repr)
            .map_err(|raw| SessionError::InvalidStateTransition {
                from: IndexSessionState::from_repr(raw),
                to: next,
            })
    }

    /// Succeed only when the observed state is [`IndexSessionState::Ready`]
    pub fn check(&self) -> SessionResult<()> {
        match self.load() {
            IndexSessionState::Ready => Ok(()),
            IndexSessionState::Init => Err(SessionError::SessionNotReady),
            IndexSessionState::Disabled => Err(SessionError::SessionDisabled),
        }
    }
}

impl Default for SessionStateCell {
    fn default() -> Self {
        Self::new(IndexSessionState::Init)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== IndexSessionState Tests ====================

    #[test]
    fn state_as_str_matches_display() {
        for state in [
            IndexSessionState::Init,
            IndexSessionState::Ready,
            IndexSessionState::Disabled,
        ] {
            assert_eq!(state.to_string(), state.as_str());
        }
    }

    #[test]
    fn state_serializes_snake_case() {
        let json = serde_json::to_string(&IndexSessionState::Disabled).unwrap();
        assert_eq!(json, "\"disabled\"");
    }

    #[test]
    fn state_repr_values_are_stable() {
        assert_eq!(IndexSessionState::Init.as_repr(), 1);
        assert_eq!(IndexSessionState::Ready.as_repr(), 2);
        assert_eq!(IndexSessionState::Disabled.as_repr(), 3);
    }

    // ==================== Cell Tests ====================

    #[test]
    fn new_cell_defaults_to_init() {
        let cell = SessionStateCell::default();
        assert_eq!(cell.load(), IndexSessionState::Init);
    }

    #[test]
    fn store_is_visible_to_load() {
        let cell = SessionStateCell::default();
        cell.store(IndexSessionState::Ready);
        assert_eq!(cell.load(), IndexSessionState::Ready);
    }

    #[test]
    fn transition_returns_previous_state() {
        let cell = SessionStateCell::default();
        let previous = cell.transition(IndexSessionState::Ready).unwrap();
        assert_eq!(previous, IndexSessionState::Init);
        assert_eq!(cell.load(), IndexSessionState::Ready);
    }

    #[test]
    fn transition_out_of_disabled_is_refused() {
        let cell = SessionStateCell::new(IndexSessionState::Disabled);

        for next in [IndexSessionState::Init, IndexSessionState::Ready] {
            let result = cell.transition(next);
            assert!(matches!(
                result,
                Err(SessionError::InvalidStateTransition {
                    from: IndexSessionState::Disabled,
                    ..
                })
            ));
        }
        assert_eq!(cell.load(), IndexSessionState::Disabled);
    }

    #[test]
    fn disabling_twice_is_allowed() {
        let cell = SessionStateCell::new(IndexSessionState::Disabled);
        assert!(cell.transition(IndexSessionState::Disabled).is_ok());
    }

    // ==================== Check Tests ====================

    #[test]
    fn check_passes_only_when_ready() {
        let cell = SessionStateCell::new(IndexSessionState::Ready);
        assert!(cell.check().is_ok());
    }

    #[test]
    fn check_init_is_not_ready() {
        let cell = SessionStateCell::new(IndexSessionState::Init);
        assert!(matches!(cell.check(), Err(SessionError::SessionNotReady)));
    }

    #[test]
    fn check_disabled_is_disabled() {
        let cell = SessionStateCell::new(IndexSessionState::Disabled);
        assert!(matches!(cell.check(), Err(SessionError::SessionDisabled)));
    }
}
