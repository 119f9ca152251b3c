//! [`BlockHashProposal`]: one speculative block's hash layered over a parent
//! buffer, without copying the parent's 256 entries.

use crate::ring::BlockHashBuffer;
use ferrochain_primitives::Hash256;
use std::sync::Arc;

/// A single speculative block hash, falling back to `parent` for every
/// other block number. Chaining these (a proposal's parent is itself a
/// proposal) lets an unbroken run of unfinalized blocks share one finalized
/// ring without materializing a 256-entry copy per proposal.
#[derive(Clone)]
pub struct BlockHashProposal {
    parent: Arc<dyn BlockHashBuffer + Send + Sync>,
    block_number: u64,
    hash: Hash256,
}

impl BlockHashProposal {
    /// Proposes `hash` for the block immediately following `parent`.
    pub fn new(hash: Hash256, parent: Arc<dyn BlockHashBuffer + Send + Sync>) -> Self {
        let block_number = parent.n();
        Self { parent, block_number, hash }
    }

    /// The block number this proposal itself contributes (as opposed to
    /// whatever its parent chain covers).
    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    /// The hash this proposal itself contributes.
    pub fn hash(&self) -> Hash256 {
        self.hash
    }
}

impl BlockHashBuffer for BlockHashProposal {
    fn n(&self) -> u64 {
        self.block_number + 1
    }

    fn get(&self, block_number: u64) -> Hash256 {
        if block_number == self.block_number {
            self.hash
        } else {
            self.parent.get(block_number)
        }
    }
}
