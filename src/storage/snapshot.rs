//! Snapshot persistence for the local engine
//!
//! The engine hands its full state to a [`SnapshotStore`] after every
//! successful mutation and asks it for the last state on startup.
//!
//! ## File Format
//! ```text
//! {
//!   "<table name>": [ {<field>: <value>, ...}, ... ],
//!   ...
//! }
//! ```
//! Sets are written as `{"$type": "set", "elements": [...]}`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

use super::Tables;

/// Load/save hook for the local engine's state
pub trait SnapshotStore: Send + Sync {
    /// Last saved state, or `None` when nothing was saved yet
    fn load(&self) -> Result<Option<Tables>>;

    /// Replace the saved state
    fn save(&self, tables: &Tables) -> Result<()>;
}

/// Snapshot kept in a single JSON file
#[derive(Debug, Clone)]
pub struct JsonFileSnapshot {
    path: PathBuf,
}

impl JsonFileSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scratch file the next state is written to before it replaces the snapshot
    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotStore for JsonFileSnapshot {
    fn load(&self) -> Result<Option<Tables>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)?;
        let tables: Tables = serde_json::from_str(&contents)?;
        Ok(Some(tables))
    }

    fn save(&self, tables: &Tables) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(tables)?;

        // Write-then-rename so a crash never leaves a half-written snapshot
        let tmp = self.tmp_path();
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
