//! [`NodeCache`]: an in-memory cache of recently read or written nodes.
//!
//! Whether a given node is worth keeping is a [`crate::StateMachine::cache`]
//! decision made by the caller; this type just holds whatever it's told to.

use ferrochain_node_codec::Node;
use ferrochain_storage_pool::ChunkOffset;
use lru::LruCache;
use parking_lot::Mutex;
use std::{num::NonZeroUsize, sync::Arc};

/// A bounded LRU cache from a node's on-disk location to its decoded form,
/// sparing a traversal that just wrote or read a node from immediately
/// paying another disk round trip for it.
pub struct NodeCache {
    inner: Mutex<LruCache<ChunkOffset, Arc<Node>>>,
}

impl NodeCache {
    /// Builds a cache holding up to `capacity` nodes.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { inner: Mutex::new(LruCache::new(capacity)) }
    }

    /// Looks up `offset`, promoting it to most-recently-used on a hit.
    pub fn get(&self, offset: &ChunkOffset) -> Option<Arc<Node>> {
        self.inner.lock().get(offset).cloned()
    }

    /// Inserts or refreshes `node` at `offset`.
    pub fn insert(&self, offset: ChunkOffset, node: Arc<Node>) {
        self.inner.lock().put(offset, node);
    }

    /// Drops every cached entry. Used by `ferrochain-history` compaction
    /// once it rewrites nodes to new locations, invalidating the old keys.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

impl std::fmt::Debug for NodeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeCache").field("len", &self.inner.lock().len()).finish()
    }
}
