//! [`BlockHashChain`]: tracks the tree of speculative proposals hanging off
//! the finalized ring and resolves a consensus round to its block-hash view.

use crate::{proposal::BlockHashProposal, ring::BlockHashBuffer, BlockHashRing};
use ferrochain_primitives::Hash256;
use parking_lot::RwLock;
use std::{collections::VecDeque, sync::Arc};

struct Entry {
    round: u64,
    parent_round: u64,
    buffer: Arc<BlockHashProposal>,
}

/// Manages the fork tree of speculative block-hash proposals above one
/// finalized [`BlockHashRing`]: each consensus round proposes one new block
/// hash parented on some earlier round (finalized or still-speculative), and
/// [`Self::finalize`] commits a round into the ring and prunes every
/// proposal descending from a sibling round that lost the race.
pub struct BlockHashChain {
    finalized: Arc<RwLock<BlockHashRing>>,
    last_finalized_round: u64,
    proposals: VecDeque<Entry>,
}

impl BlockHashChain {
    /// Starts tracking proposals over `finalized`, with `last_finalized_round`
    /// as the round the ring's current contents already reflect.
    pub fn new(finalized: Arc<RwLock<BlockHashRing>>, last_finalized_round: u64) -> Self {
        Self { finalized, last_finalized_round, proposals: VecDeque::new() }
    }

    /// Adds a speculative block hash for `round`, built on top of whatever
    /// `parent_round` currently resolves to (the finalized ring if
    /// `parent_round == last_finalized_round`, else that round's proposal).
    pub fn propose(&mut self, hash: Hash256, round: u64, parent_round: u64) {
        let parent: Arc<dyn BlockHashBuffer + Send + Sync> = if parent_round == self.last_finalized_round {
            Arc::new(SharedRing(self.finalized.clone()))
        } else if let Some(entry) = self.proposals.iter().find(|entry| entry.round == parent_round) {
            entry.buffer.clone()
        } else {
            Arc::new(SharedRing(self.finalized.clone()))
        };
        let buffer = Arc::new(BlockHashProposal::new(hash, parent));
        self.proposals.push_back(Entry { round, parent_round, buffer });
    }

    /// Commits `round`'s proposed hash into the finalized ring and prunes
    /// every proposal not descended from `round` — the competing branches
    /// that lost.
    pub fn finalize(&mut self, round: u64) {
        let Some(pos) = self.proposals.iter().position(|entry| entry.round == round) else {
            return;
        };
        let entry = self.proposals.remove(pos).expect("position just found");
        self.finalized.write().set(entry.buffer.block_number(), entry.buffer.hash());
        self.last_finalized_round = round;

        let mut live_roots = vec![round];
        self.proposals.retain(|entry| {
            let keep = live_roots.contains(&entry.parent_round);
            if keep {
                live_roots.push(entry.round);
            }
            keep
        });
    }

    /// Resolves `round` to the block-hash view it should see: that round's
    /// own proposal if still pending, else the finalized ring (covers both
    /// "already finalized" and "unknown round" callers).
    pub fn find_chain(&self, round: u64) -> Arc<dyn BlockHashBuffer + Send + Sync> {
        if let Some(entry) = self.proposals.iter().find(|entry| entry.round == round) {
            entry.buffer.clone()
        } else {
            Arc::new(SharedRing(self.finalized.clone()))
        }
    }
}

/// Adapts a shared, mutable [`BlockHashRing`] to [`BlockHashBuffer`] by
/// reading it through a lock, so proposals can hold a stable `Arc` to the
/// finalized ring even as it keeps advancing underneath them.
struct SharedRing(Arc<RwLock<BlockHashRing>>);

impl BlockHashBuffer for SharedRing {
    fn n(&self) -> u64 {
        self.0.read().n()
    }

    fn get(&self, block_number: u64) -> Hash256 {
        self.0.read().get(block_number)
    }
}
