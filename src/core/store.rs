//! Store handle for the controller's on-disk state.

use std::path::PathBuf;

/// A Store is the directory holding `challenge.db` and the JSONL event logs.
///
/// All subsystem state (players, scoreboard, action log) is scoped to a store.
#[derive(Debug, Clone)]
pub struct Store {
    /// Path to the store root directory
    pub root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}
