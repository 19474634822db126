//! Exponential backoff
//!
//! Used when a bulk backend call comes back partial (throttling) and when
//! repeated bulk deletes still see matches. There is no attempt ceiling: the
//! caller loops until done or until its [`Cancel`](crate::cancel::Cancel)
//! fires. Only the length of a single sleep is capped.

use std::thread;
use std::time::Duration;

use crate::config::Config;

/// Doubling sleep schedule
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    delay: Duration,
    max: Duration,
    attempts: u32,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            delay: initial,
            max,
            attempts: 0,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.backoff_initial, config.backoff_max)
    }

    /// Sleep for the current delay, then double it
    pub fn sleep(&mut self) {
        tracing::trace!(attempt = self.attempts, delay_ms = self.delay.as_millis() as u64, "backing off");
        thread::sleep(self.delay);
        self.attempts += 1;
        self.delay = self.delay.saturating_mul(2).min(self.max);
    }

    /// Sleep only if `condition` holds
    pub fn sleep_when(&mut self, condition: bool) {
        if condition {
            self.sleep();
        }
    }

    /// Delay the next sleep will use
    pub fn next_delay(&self) -> Duration {
        self.delay
    }

    /// Number of sleeps taken so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
