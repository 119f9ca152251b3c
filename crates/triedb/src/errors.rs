//! Errors for the `ferrochain-triedb` crate.

use ferrochain_mpt::MptError;

/// A [`Result`] alias where the error is [`TriedbError`].
pub type TriedbResult<T> = Result<T, TriedbError>;

/// Errors raised by [`crate::Triedb`] operations.
#[derive(derive_more::Display, Debug)]
pub enum TriedbError {
    /// The underlying trie returned an error while reading or writing a
    /// node.
    #[display("trie error: {_0}")]
    Trie(MptError),
    /// An account's stored RLP failed to decode.
    #[display("corrupt account encoding: {_0}")]
    CorruptAccount(alloy_rlp::Error),
}

impl std::error::Error for TriedbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Trie(err) => Some(err),
            Self::CorruptAccount(err) => Some(err),
        }
    }
}

impl From<MptError> for TriedbError {
    fn from(err: MptError) -> Self {
        Self::Trie(err)
    }
}

impl From<alloy_rlp::Error> for TriedbError {
    fn from(err: alloy_rlp::Error) -> Self {
        Self::CorruptAccount(err)
    }
}
