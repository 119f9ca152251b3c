//! Errors for the `ferrochain-state-sync` crate.

use ferrochain_triedb::TriedbError;

/// A [`Result`] alias where the error is [`StateSyncError`].
pub type StateSyncResult<T> = Result<T, StateSyncError>;

/// Errors raised while syncing shards.
#[derive(derive_more::Display, Debug)]
pub enum StateSyncError {
    /// Committing a shard's upserts to the local Triedb failed.
    #[display("failed committing shard to triedb: {_0}")]
    Triedb(TriedbError),
    /// A peer's server implementation returned an error serving a shard.
    #[display("peer failed serving shard: {_0}")]
    Peer(String),
    /// Every available peer was excluded (or none were available) before a
    /// shard could be synced successfully.
    #[display("no peers left to retry shard against")]
    NoPeersLeft,
    /// Every shard was individually verified, but the final recomputed
    /// state root still doesn't match the target the client asked for.
    #[display("recomputed state root does not match target after all shards committed")]
    RootMismatch,
}

impl std::error::Error for StateSyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Triedb(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TriedbError> for StateSyncError {
    fn from(err: TriedbError) -> Self {
        Self::Triedb(err)
    }
}
