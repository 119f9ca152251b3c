//! [`CompactionTask`]: forwards live nodes of retained roots into the
//! storage pool's current write tail.
//!
//! The trie's nodes are content-addressed, so rewriting a leaf's bytes to a
//! new physical chunk at the same key produces the identical root hash;
//! compaction is exactly that rewrite, done for every leaf still reachable
//! from a retained root, oldest root first. Each root's rewrite pass is
//! serialized behind that root's entry in `locks` so two compaction passes
//! (or a compaction pass racing a live upsert under the same root) never
//! interleave their node writes.

use crate::errors::HistoryResult;
use ferrochain_mpt::{StateMachine, Trie, Update, Visitor};
use ferrochain_node_codec::NodePath;
use ferrochain_primitives::Hash256;
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

struct LeafCollector {
    leaves: Vec<(Vec<u8>, Vec<u8>)>,
}

impl Visitor for LeafCollector {
    fn visit_leaf(&mut self, path: &[u8], value: &[u8]) {
        self.leaves.push((path.to_vec(), value.to_vec()));
    }
}

fn pack_nibbles(nibbles: &[u8]) -> NodePath {
    let mut packed = Vec::with_capacity(nibbles.len().div_ceil(2));
    let mut iter = nibbles.iter().copied();
    while let Some(hi) = iter.next() {
        let lo = iter.next().unwrap_or(0);
        packed.push((hi << 4) | lo);
    }
    NodePath { packed, len: nibbles.len() }
}

/// Rewrites every node reachable from a set of retained roots forward into
/// the storage pool's current write tail, without changing any root's
/// Merkle hash.
pub struct CompactionTask<SM: StateMachine + Clone> {
    trie: Trie<SM>,
    /// One critical section per root currently being compacted, so a root's
    /// rewrite pass never races a second pass over the same root.
    locks: Mutex<HashMap<Hash256, Arc<Mutex<()>>>>,
}

impl<SM: StateMachine + Clone + Send + Sync + 'static> CompactionTask<SM> {
    /// Wraps `trie` for compaction. `trie` is cloned cheaply per call — the
    /// clone shares the same storage pool, I/O ring and node cache.
    pub fn new(trie: Trie<SM>) -> Self {
        Self { trie, locks: Mutex::new(HashMap::new()) }
    }

    fn root_lock(&self, root: Hash256) -> Arc<Mutex<()>> {
        self.locks.lock().entry(root).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Runs one compaction pass over `root`: collects every live leaf
    /// reachable from it and re-upserts them at their own keys, forcing
    /// their containing nodes to be re-serialized into the current write
    /// tail. A no-op if `root` has no leaves under `prefix` (the empty
    /// trie, or a subtree already fully compacted).
    pub async fn compact(&self, root: Hash256) -> HistoryResult<Hash256> {
        let lock = self.root_lock(root);
        let _guard = lock.lock();

        let mut collector = LeafCollector { leaves: Vec::new() };
        let empty = ferrochain_primitives::NibbleView::new(&[]);
        self.trie.traverse(root, &empty, &mut collector).await?;

        if collector.leaves.is_empty() {
            debug!(%root, "compaction: nothing to rewrite");
            return Ok(root);
        }

        let updates: Vec<Update> = collector
            .leaves
            .into_iter()
            .map(|(path, value)| Update::write(pack_nibbles(&path), value))
            .collect();

        let rewritten = self.trie.upsert(root, &updates).await?;
        debug!(%root, %rewritten, "compaction: rewrote live nodes into current write tail");
        Ok(rewritten)
    }

    /// Runs one compaction pass over every root in `retain`, oldest first,
    /// dropping a per-root critical section once its pass completes.
    pub async fn compact_retained(&self, retain: impl IntoIterator<Item = Hash256>) -> HistoryResult<()> {
        for root in retain {
            self.compact(root).await?;
        }
        // Drop critical sections for roots no longer worth tracking; the
        // map only needs to hold locks for in-flight or recently compacted
        // roots, not forever.
        self.locks.lock().retain(|_, lock| Arc::strong_count(lock) > 1);
        Ok(())
    }
}
