//! Grid and GridFactory traits

use async_trait::async_trait;

use crate::error::GridError;

/// An index engine instance owned by exactly one session
///
/// Methods take `&self` so any number of reference holders can use the grid
/// at once; implementations synchronize internally.
#[async_trait]
pub trait Grid: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Open the grid for use
    async fn open(&self) -> Result<(), GridError>;

    /// Set how many chapters are written between checkpoints
    async fn set_checkpoint_frequency(&self, frequency: u32) -> Result<(), GridError>;

    /// Persist the grid
    async fn save(&self) -> Result<(), GridError>;

    /// Release the grid's resources
    async fn close(&self);
}

/// Factory for creating grids
///
/// Enables dependency injection of grid implementations.
pub trait GridFactory: Send + Sync {
    /// Create an unopened grid
    fn create(&self, name: &str) -> Box<dyn Grid>;
}
