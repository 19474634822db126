//! Cancellation tokens
//!
//! Long-running bulk operations poll a [`Cancel`] between backend calls.
//! A single backend call is never interrupted.

use std::time::{Duration, Instant};

/// Cooperative cancellation: never, or after an absolute deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cancel {
    Never,
    Deadline(Instant),
}

impl Cancel {
    pub fn never() -> Self {
        Cancel::Never
    }

    /// Cancel once `duration` has elapsed from now
    pub fn after_timeout(duration: Duration) -> Self {
        Cancel::Deadline(Instant::now() + duration)
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            Cancel::Never => false,
            Cancel::Deadline(deadline) => Instant::now() >= *deadline,
        }
    }
}

impl Default for Cancel {
    fn default() -> Self {
        Cancel::Never
    }
}
