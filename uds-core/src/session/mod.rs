//! Index session management

pub mod envelope;
pub mod index_session;
pub mod manager;
pub mod registry;
pub mod state;

// Re-export key types for convenience
pub use envelope::SessionEnvelope;
pub use index_session::{IndexSession, IndexSessionRef, SessionId};
pub use manager::{IndexSessionManager, SessionInfo};
pub use registry::SessionRegistry;
pub use state::{IndexSessionState, SessionStateCell};
