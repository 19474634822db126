//! Configuration for dynatable
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, TableError};

/// Main configuration shared by the storage backends
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Local Engine Configuration
    // -------------------------------------------------------------------------
    /// Snapshot file backing the in-memory engine.
    /// `None` keeps everything in process memory only.
    pub snapshot_path: Option<PathBuf>,

    // -------------------------------------------------------------------------
    // Remote Backend Configuration
    // -------------------------------------------------------------------------
    /// Prefix for physical table names (`{prefix}-{name}`), empty for none
    pub table_prefix: String,

    /// Max keys per remote batch read request
    pub batch_get_chunk_size: usize,

    // -------------------------------------------------------------------------
    // Retry Configuration
    // -------------------------------------------------------------------------
    /// First backoff delay when a bulk call comes back partial
    pub backoff_initial: Duration,

    /// Upper bound for a single backoff sleep (attempts are unbounded)
    pub backoff_max: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            table_prefix: String::new(),
            batch_get_chunk_size: 100,
            backoff_initial: Duration::from_millis(50),
            backoff_max: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Environment variable naming the local snapshot file
    pub const SNAPSHOT_ENV: &'static str = "DYNATABLE_SNAPSHOT";

    /// Environment variable holding the remote table prefix
    pub const TABLE_PREFIX_ENV: &'static str = "DYNATABLE_TABLE_PREFIX";

    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Build a config from the process environment, falling back to defaults
    pub fn from_env() -> Self {
        let mut builder = Self::builder();
        if let Ok(path) = std::env::var(Self::SNAPSHOT_ENV) {
            if !path.is_empty() {
                builder = builder.snapshot_path(path);
            }
        }
        if let Ok(prefix) = std::env::var(Self::TABLE_PREFIX_ENV) {
            builder = builder.table_prefix(prefix);
        }
        builder.build()
    }

    /// Check settings that would make a backend misbehave
    pub fn validate(&self) -> Result<()> {
        if self.batch_get_chunk_size == 0 {
            return Err(TableError::Config(
                "batch_get_chunk_size must be at least 1".to_string(),
            ));
        }
        if self.backoff_max < self.backoff_initial {
            return Err(TableError::Config(format!(
                "backoff_max ({:?}) is smaller than backoff_initial ({:?})",
                self.backoff_max, self.backoff_initial
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the snapshot file for the local engine
    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.snapshot_path = Some(path.into());
        self
    }

    /// Set the remote table name prefix
    pub fn table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.table_prefix = prefix.into();
        self
    }

    /// Set the maximum number of keys per remote batch read
    pub fn batch_get_chunk_size(mut self, size: usize) -> Self {
        self.config.batch_get_chunk_size = size;
        self
    }

    /// Set the first backoff delay
    pub fn backoff_initial(mut self, delay: Duration) -> Self {
        self.config.backoff_initial = delay;
        self
    }

    /// Set the per-sleep backoff cap
    pub fn backoff_max(mut self, delay: Duration) -> Self {
        self.config.backoff_max = delay;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
