//! In-memory grid for testing and the CLI
//!
//! MemoryGrid keeps no index data; it tracks the calls made against it so
//! tests can check what a session did with its grid. Failures can be
//! scripted for `open` and `save`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use super::traits::{Grid, GridFactory};
use crate::error::GridError;

/// Default upper bound for the checkpoint frequency
pub const DEFAULT_CHAPTERS_PER_VOLUME: u32 = 1024;

#[derive(Debug, Default)]
struct ProbeState {
    open: AtomicBool,
    closed: AtomicBool,
    saves: AtomicUsize,
    checkpoint_frequency: AtomicU32,
    frequency_updates: AtomicUsize,
}

/// Shared view of a [`MemoryGrid`]'s activity
///
/// Stays readable after the grid itself has been closed and dropped.
#[derive(Debug, Clone, Default)]
pub struct GridProbe {
    state: Arc<ProbeState>,
}

impl GridProbe {
    /// Whether the grid is open
    pub fn is_open(&self) -> bool {
        self.state.open.load(Ordering::SeqCst)
    }

    /// Whether the grid has been closed
    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.state.saves.load(Ordering::SeqCst)
    }

    /// Last accepted checkpoint frequency
    pub fn checkpoint_frequency(&self) -> u32 {
        self.state.checkpoint_frequency.load(Ordering::SeqCst)
    }

    /// Number of accepted checkpoint frequency changes
    pub fn frequency_updates(&self) -> usize {
        self.state.frequency_updates.load(Ordering::SeqCst)
    }
}

/// Grid implementation that lives entirely in memory
pub struct MemoryGrid {
    name: String,
    chapters_per_volume: u32,
    open_failure: Option<String>,
    save_failure: Option<String>,
    probe: GridProbe,
}

impl MemoryGrid {
    /// Create a grid with the default geometry
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chapters_per_volume: DEFAULT_CHAPTERS_PER_VOLUME,
            open_failure: None,
            save_failure: None,
            probe: GridProbe::default(),
        }
    }

    /// Limit accepted checkpoint frequencies to `chapters`
    #[must_use]
    pub fn with_chapters_per_volume(mut self, chapters: u32) -> Self {
        self.chapters_per_volume = chapters;
        self
    }

    /// Make `open()` fail with `reason`
    #[must_use]
    pub fn with_open_failure(mut self, reason: impl Into<String>) -> Self {
        self.open_failure = Some(reason.into());
        self
    }

    /// Make `save()` fail with `reason`
    #[must_use]
    pub fn with_save_failure(mut self, reason: impl Into<String>) -> Self {
        self.save_failure = Some(reason.into());
        self
    }

    /// Handle for observing this grid
    pub fn probe(&self) -> GridProbe {
        self.probe.clone()
    }

    fn ensure_open(&self) -> Result<(), GridError> {
        if self.probe.is_open() {
            Ok(())
        } else {
            Err(GridError::NotOpen(self.name.clone()))
        }
    }
}

#[async_trait]
impl Grid for MemoryGrid {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&self) -> Result<(), GridError> {
        if let Some(reason) = &self.open_failure {
            return Err(GridError::OpenFailed {
                name: self.name.clone(),
                reason: reason.clone(),
            });
        }
        self.probe.state.closed.store(false, Ordering::SeqCst);
        self.probe.state.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn set_checkpoint_frequency(&self, frequency: u32) -> Result<(), GridError> {
        self.ensure_open()?;
        if frequency > self.chapters_per_volume {
            return Err(GridError::InvalidCheckpointFrequency {
                frequency,
                maximum: self.chapters_per_volume,
            });
        }
        self.probe
            .state
            .checkpoint_frequency
            .store(frequency, Ordering::SeqCst);
        self.probe
            .state
            .frequency_updates
            .fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn save(&self) -> Result<(), GridError> {
        self.ensure_open()?;
        if let Some(reason) = &self.save_failure {
            return Err(GridError::SaveFailed {
                name: self.name.clone(),
                reason: reason.clone(),
            });
        }
        self.probe.state.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) {
        self.probe.state.open.store(false, Ordering::SeqCst);
        self.probe.state.closed.store(true, Ordering::SeqCst);
    }
}

/// Factory producing [`MemoryGrid`]s and remembering their probes by name
#[derive(Debug, Default)]
pub struct MemoryGridFactory {
    chapters_per_volume: Option<u32>,
    probes: Mutex<HashMap<String, GridProbe>>,
}

impl MemoryGridFactory {
    /// Create a factory using the default geometry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create grids limited to `chapters` per volume
    #[must_use]
    pub fn with_chapters_per_volume(mut self, chapters: u32) -> Self {
        self.chapters_per_volume = Some(chapters);
        self
    }

    /// Probe for the most recent grid created under `name`
    pub fn probe(&self, name: &str) -> Option<GridProbe> {
        self.probes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Probes for every grid created so far
    pub fn probes(&self) -> Vec<(String, GridProbe)> {
        self.probes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, probe)| (name.clone(), probe.clone()))
            .collect()
    }
}

impl GridFactory for MemoryGridFactory {
    fn create(&self, name: &str) -> Box<dyn Grid> {
        let mut grid = MemoryGrid::new(name);
        if let Some(chapters) = self.chapters_per_volume {
            grid = grid.with_chapters_per_volume(chapters);
        }
        self.probes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), grid.probe());
        Box::new(grid)
    }
}
