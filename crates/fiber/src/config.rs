//! Configuration for [`crate::FiberPool`].

use std::time::Duration;

/// Construction parameters for [`crate::FiberPool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker threads, each running its own cooperative scheduler.
    pub workers: usize,
    /// Bounded submission channel capacity; [`crate::FiberPool::spawn`]
    /// backpressures the caller once it is full.
    pub submission_capacity: usize,
    /// How long an idle worker sleeps before re-checking its queues.
    pub idle_sleep: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            submission_capacity: 1024,
            idle_sleep: Duration::from_micros(10),
        }
    }
}
