//! Observability hooks
//!
//! The table façade reports an elapsed-time event per operation and counter
//! events for call and record volume to an injected [`QueryObserver`].
//! The default observer does nothing.

use std::sync::Arc;
use std::time::Instant;

/// Receives timing and counter events
pub trait QueryObserver: Send + Sync {
    /// `operation` took `elapsed_ms` milliseconds
    fn timer(&self, operation: &str, elapsed_ms: u64) {
        let _ = (operation, elapsed_ms);
    }

    /// Bump `counter` by `increment`
    fn counter(&self, counter: &str, increment: u64) {
        let _ = (counter, increment);
    }
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl QueryObserver for NoopObserver {}

/// Observer that forwards events to `tracing` at debug level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl QueryObserver for TracingObserver {
    fn timer(&self, operation: &str, elapsed_ms: u64) {
        tracing::debug!(operation, elapsed_ms, "timer");
    }

    fn counter(&self, counter: &str, increment: u64) {
        tracing::debug!(counter, increment, "counter");
    }
}

/// Reports elapsed time to an observer when dropped
pub struct Timed<'a> {
    observer: &'a Arc<dyn QueryObserver>,
    operation: &'static str,
    start: Instant,
}

impl<'a> Timed<'a> {
    pub fn start(observer: &'a Arc<dyn QueryObserver>, operation: &'static str) -> Self {
        Self {
            observer,
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for Timed<'_> {
    fn drop(&mut self) {
        let elapsed_ms = self.start.elapsed().as_millis() as u64;
        self.observer.timer(self.operation, elapsed_ms);
    }
}
