//! Grid abstraction
//!
//! The grid is the index engine behind a session. This crate only needs to
//! open, checkpoint, save, and close it.

pub mod memory;
pub mod traits;

// Re-export key types for convenience
pub use memory::{GridProbe, MemoryGrid, MemoryGridFactory};
pub use traits::{Grid, GridFactory};
