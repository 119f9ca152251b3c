//! Errors for the `ferrochain-history` crate.

use ferrochain_mpt::MptError;
use ferrochain_primitives::Hash256;

/// A [`Result`] alias where the error is [`HistoryError`].
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Errors raised by [`crate::RetentionRing`]/[`crate::CompactionTask`].
#[derive(derive_more::Display, Debug)]
pub enum HistoryError {
    /// A root requested for compaction or lookup has fallen outside the
    /// retention window.
    #[display("root {_0} is no longer retained")]
    Evicted(Hash256),
    /// A compaction pass failed while re-reading or re-writing a live node.
    #[display("compaction failed: {_0}")]
    Trie(MptError),
}

impl std::error::Error for HistoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Trie(err) => Some(err),
            Self::Evicted(_) => None,
        }
    }
}

impl From<MptError> for HistoryError {
    fn from(err: MptError) -> Self {
        Self::Trie(err)
    }
}
