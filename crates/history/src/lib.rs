//! Retention window over recently committed trie roots, plus a background
//! compaction task that keeps the storage pool from growing without bound by
//! re-serializing still-live nodes forward into its write tail.

mod compaction;
pub use compaction::CompactionTask;

mod config;
pub use config::RetentionConfig;

mod errors;
pub use errors::{HistoryError, HistoryResult};

mod ring;
pub use ring::RetentionRing;
