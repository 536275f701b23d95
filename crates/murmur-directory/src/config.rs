//! Directory actor configuration.

use std::time::Duration;

/// Settings for a directory actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryConfig {
    /// Capacity of the command queue. Telemetry arriving while the queue is
    /// full is dropped (and logged). Values below 1 are treated as 1.
    pub queue: usize,

    /// How long a query waits for its answer, queueing included.
    pub timeout: Duration,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            queue: 256,
            timeout: Duration::from_secs(2),
        }
    }
}
