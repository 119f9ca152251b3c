//! Errors for the `ferrochain-mpt` crate.

use ferrochain_io_ring::IoError;
use ferrochain_node_codec::CodecError;

/// A [`Result`] alias where the error is [`MptError`].
pub type MptResult<T> = Result<T, MptError>;

/// Errors raised by [`crate::Trie`] operations.
#[derive(derive_more::Display, Debug)]
pub enum MptError {
    /// `get`/`traverse` found no leaf at the requested key. Covers both "no
    /// node on the path at all" and "a node exists on the path but it isn't
    /// a leaf at this exact key" — callers never need the distinction.
    #[display("key not found")]
    KeyNotFound,
    /// The requested version fell out of the retention window maintained by
    /// `ferrochain-history`.
    #[display("version no longer exists")]
    VersionNoLongerExists,
    /// A node on disk failed to decode.
    #[display("corrupt node: {_0}")]
    CorruptNode(CodecError),
    /// An I/O error from the ring/storage pool. This is
    /// always fatal.
    #[display("fatal I/O error: {_0}")]
    IoFatal(IoError),
}

impl std::error::Error for MptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::CorruptNode(err) => Some(err),
            Self::IoFatal(err) => Some(err),
            Self::KeyNotFound | Self::VersionNoLongerExists => None,
        }
    }
}

impl From<CodecError> for MptError {
    fn from(err: CodecError) -> Self {
        Self::CorruptNode(err)
    }
}

impl From<IoError> for MptError {
    fn from(err: IoError) -> Self {
        Self::IoFatal(err)
    }
}
