//! Errors for the `ferrochain-block-state` crate.

use ferrochain_triedb::TriedbError;

/// A [`Result`] alias where the error is [`BlockStateError`].
pub type BlockStateResult<T> = Result<T, BlockStateError>;

/// Errors raised by [`crate::BlockState`] operations.
#[derive(derive_more::Display, Debug)]
pub enum BlockStateError {
    /// A read-through to the underlying Triedb failed.
    #[display("triedb read-through failed: {_0}")]
    Triedb(TriedbError),
}

impl std::error::Error for BlockStateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Triedb(err) => Some(err),
        }
    }
}

impl From<TriedbError> for BlockStateError {
    fn from(err: TriedbError) -> Self {
        Self::Triedb(err)
    }
}
