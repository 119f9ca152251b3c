//! Configuration for the retention ring and compaction task.

/// Construction parameters for [`crate::RetentionRing`]/[`crate::CompactionTask`].
#[derive(Debug, Clone, Copy)]
pub struct RetentionConfig {
    /// Number of most-recently-committed roots kept queryable (`H`). A root
    /// older than the `history_len`-th most recent commit is no longer
    /// guaranteed reachable.
    pub history_len: usize,
    /// How often the background compaction task runs one pass, in
    /// milliseconds.
    pub compaction_interval_ms: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { history_len: 256, compaction_interval_ms: 1_000 }
    }
}
