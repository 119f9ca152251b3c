//! The wire message shapes the client and server exchange per shard.

use crate::prefix::ShardPrefix;
use alloy_consensus::Header;
use ferrochain_primitives::{Address, Code, Hash256, U256};
use ferrochain_triedb::AccountRlp;

/// A client's request for one shard of the state as of `target_root`,
/// restricted to blocks `from..until` for the header stream.
#[derive(Debug, Clone)]
pub struct ShardRequest {
    /// The nibble prefix identifying this shard.
    pub prefix: ShardPrefix,
    /// The state root the client wants this shard's data as of.
    pub target_root: Hash256,
    /// First block number whose header the client also wants streamed.
    pub from: u64,
    /// One past the last block number whose header the client wants.
    pub until: u64,
}

/// One message in a shard's response stream.
#[derive(Debug, Clone)]
pub enum ServerMessage {
    /// An account's consensus-encoded state.
    UpsertAccount { address: Address, account: AccountRlp },
    /// One storage slot belonging to `address`.
    UpsertStorage { address: Address, slot: U256, value: U256 },
    /// A piece of contract code, addressed by its own hash.
    UpsertCode { code: Code },
    /// A block header within the requested `from..until` range.
    UpsertHeader { header: Header },
    /// Terminates the stream. The server computes `shard_digest` from its
    /// own upserts before sending them; the client recomputes the same
    /// digest from what it received and compares, catching a truncated or
    /// corrupted shard without needing a Merkle range-proof over the trie.
    /// Carries `shard_digest` alongside `{success, prefix, count}` — a
    /// digest is what actually makes "retry the shard" checkable.
    Done { success: bool, prefix: ShardPrefix, count: u64, shard_digest: Hash256 },
}
