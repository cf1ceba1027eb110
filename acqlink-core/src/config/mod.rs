//! Runtime configuration types shared with the server crate.
//!
//! The server parses the TOML file and builds these; the core only reads
//! them, usually through a [`ConfigStore`] so they can be reloaded.

mod config_store;

pub use config_store::{ConfigStore, ConfigWatcher};

use std::time::Duration;

/// Settings for one [`TaskWorker`](crate::processors::TaskWorker).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Queue pool this worker leases from.
    pub pool: String,
    /// Maximum leases processed concurrently.
    pub max_workers: usize,
    /// Pause between lease rounds when the queue is drained.
    pub poll_interval: Duration,
    /// How long a lease is held before another worker may reclaim it.
    pub lease_duration: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pool: crate::processors::payment_status::DEFAULT_POOL.to_string(),
            max_workers: 10,
            poll_interval: Duration::from_secs(60),
            lease_duration: Duration::from_secs(600),
        }
    }
}

impl WorkerConfig {
    /// Lease length as a `time::Duration`, which the queue speaks.
    pub fn lease_for(&self) -> time::Duration {
        time::Duration::try_from(self.lease_duration).unwrap_or(time::Duration::minutes(10))
    }
}
