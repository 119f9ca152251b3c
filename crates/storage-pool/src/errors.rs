//! Errors for the `ferrochain-storage-pool` crate.

use std::path::PathBuf;

/// A [`Result`] alias where the error is [`PoolError`].
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors raised by the [`crate::StoragePool`].
///
/// `IoFatal` and `PoolExhausted` are distinguished deliberately: an I/O error
/// from the OS is fatal (the process must abort to preserve durability),
/// while exhaustion is a recoverable backpressure signal that callers
/// may retry after compaction frees chunks.
#[derive(derive_more::Display, Debug)]
pub enum PoolError {
    /// No chunk could be recycled to satisfy an allocation.
    #[display("storage pool exhausted: no free chunk available")]
    PoolExhausted,
    /// A write was not page-aligned; partial-page writes are disallowed.
    #[display("write of {len} bytes at offset {offset} is not page-aligned")]
    UnalignedWrite {
        /// The offending byte length.
        len: usize,
        /// The offending byte offset.
        offset: u64,
    },
    /// An addressed chunk does not exist in any configured backing file.
    #[display("chunk {chunk_id} is out of range")]
    ChunkOutOfRange {
        /// The chunk id that was addressed.
        chunk_id: u32,
    },
    /// A non-recoverable I/O error from the operating system. The process
    /// must abort rather than attempt to continue with a
    /// possibly-corrupt pool.
    #[display("fatal I/O error on {path:?}: {source}")]
    IoFatal {
        /// The file the error occurred on.
        path: PathBuf,
        /// The underlying OS error.
        source: std::io::Error,
    },
}

impl std::error::Error for PoolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoFatal { source, .. } => Some(source),
            _ => None,
        }
    }
}
