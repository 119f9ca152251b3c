//! [`Trie`]: a versioned, copy-on-write Merkle Patricia Trie over the
//! storage pool, node codec and async I/O ring.
//!
//! Every [`Trie::upsert`] takes a root and a batch of [`Update`]s and
//! returns a brand new root; the old root and every node it reaches stay
//! valid and untouched. Grounded on `kona-mpt`'s `TrieNode`/
//! `TrieCacheDB` traversal style (`open`/`insert`/`blind`), generalized to
//! write through the node codec and storage pool instead of keeping
//! everything as in-memory RLP, and to produce a new root per commit instead
//! of mutating in place.

use crate::{
    cache::NodeCache,
    errors::{MptError, MptResult},
    rlp::{decode_embedded, encode_node_rlp},
    state_machine::StateMachine,
    update::Update,
};
use alloy_consensus::EMPTY_ROOT_HASH;
use async_recursion::async_recursion;
use dashmap::DashMap;
use ferrochain_io_ring::IoRing;
use ferrochain_node_codec::{node_disk_pages, serialize, ChildRef, Node, NodePath, MAX_EMBEDDED_LEN};
use ferrochain_primitives::{Hash256, NibbleView};
use ferrochain_storage_pool::{ChunkOffset, StoragePool};
use std::{collections::HashMap, sync::Arc};
use tracing::trace;

/// One write, flattened from an [`Update`] tree to an absolute nibble path
/// from the trie root. `sub_updates` have already been folded in by
/// concatenating their relative key onto their parent's.
#[derive(Debug, Clone)]
struct FlatWrite {
    key: Vec<u8>,
    value: Option<Vec<u8>>,
}

/// An in-progress, not-yet-persisted piece of the new trie shape.
///
/// [`Scratch::Existing`] wraps a subtree no write touched; it is carried
/// through unchanged and costs no I/O to finalize, which is what makes
/// copy-on-write commits cheap.
enum Scratch {
    Leaf { path: Vec<u8>, value: Vec<u8> },
    Extension { path: Vec<u8>, child: Box<Scratch> },
    Branch { children: [Option<Box<Scratch>>; 16], value: Option<Vec<u8>> },
    Existing(ChildRef),
}

/// Where a committed root's node lives: inlined in the root map itself, or
/// on disk like any other large node. A root is never forced to disk purely
/// because it's a root — an empty or near-empty trie's root stays embedded.
#[derive(Debug, Clone)]
enum RootLocation {
    Embedded(Vec<u8>),
    OnDisk(ChunkOffset),
}

/// Visits leaves reachable from a traversal's starting prefix.
///
/// `should_descend` lets a caller prune subtrees it isn't interested in
/// (e.g. a range scan) without forcing every node on the path to be read.
pub trait Visitor: Send {
    /// Whether traversal should read into the subtree at `path` at all.
    fn should_descend(&mut self, path: &[u8]) -> bool {
        let _ = path;
        true
    }

    /// Called once per leaf found, with its full nibble path from the root.
    fn visit_leaf(&mut self, path: &[u8], value: &[u8]);
}

/// A versioned Merkle Patricia Trie.
///
/// Cloning is cheap: clones share the same storage pool, I/O ring, node
/// cache and root table. `SM` is cloned per call so each traversal tracks
/// its own depth (its `StateMachine`).
pub struct Trie<SM: StateMachine + Clone> {
    ring: IoRing,
    pool: Arc<StoragePool>,
    cache: Arc<NodeCache>,
    roots: Arc<DashMap<Hash256, RootLocation>>,
    state_machine: SM,
}

impl<SM: StateMachine + Clone> Clone for Trie<SM> {
    fn clone(&self) -> Self {
        Self {
            ring: self.ring.clone(),
            pool: self.pool.clone(),
            cache: self.cache.clone(),
            roots: self.roots.clone(),
            state_machine: self.state_machine.clone(),
        }
    }
}

impl<SM: StateMachine + Clone + Send + Sync + 'static> Trie<SM> {
    /// Builds a trie over `pool`/`ring`, with a node cache sized for
    /// `cache_capacity` entries and `state_machine` as the per-call policy
    /// template.
    pub fn new(ring: IoRing, pool: Arc<StoragePool>, cache_capacity: usize, state_machine: SM) -> Self {
        Self { ring, pool, cache: Arc::new(NodeCache::new(cache_capacity)), roots: Arc::new(DashMap::new()), state_machine }
    }

    /// The canonical empty-trie root.
    pub const fn empty_root() -> Hash256 {
        EMPTY_ROOT_HASH
    }

    /// Reads the value at `key` under `root`.
    ///
    /// Returns `Ok(None)` uniformly whether `key`'s prefix is entirely
    /// absent or a node exists on the path but no leaf sits at this exact
    /// key — callers never need the distinction.
    pub async fn get(&self, root: Hash256, key: &NibbleView<'_>) -> MptResult<Option<Vec<u8>>> {
        let Some(mut child) = self.root_child_ref(root)? else {
            return Ok(None);
        };
        let mut remaining = key.substr(0, key.len());
        loop {
            let node = self.resolve(&child).await?;
            match node {
                Node::Leaf { path, value, .. } => {
                    return Ok((remaining == path.as_view()).then_some(value));
                }
                Node::Extension { path, child: next, .. } => {
                    if !remaining.starts_with(&path.as_view()) {
                        return Ok(None);
                    }
                    remaining = remaining.skip(path.as_view().len());
                    child = next;
                }
                Node::Branch { children, value, .. } => {
                    if remaining.is_empty() {
                        return Ok(value);
                    }
                    let nibble = remaining.get(0).expect("non-empty checked above");
                    match &children[nibble as usize] {
                        None => return Ok(None),
                        Some(next) => {
                            remaining = remaining.skip(1);
                            child = next.clone();
                        }
                    }
                }
            }
        }
    }

    /// Depth-first visits every leaf reachable from `prefix` under `root`.
    pub async fn traverse(&self, root: Hash256, prefix: &NibbleView<'_>, visitor: &mut dyn Visitor) -> MptResult<()> {
        let Some(child) = self.root_child_ref(root)? else {
            return Ok(());
        };
        let mut path = prefix.to_owned_bytes_vec();
        self.traverse_inner(&child, &mut path, visitor).await
    }

    #[async_recursion]
    async fn traverse_inner(&self, child: &ChildRef, path: &mut Vec<u8>, visitor: &mut dyn Visitor) -> MptResult<()> {
        if !visitor.should_descend(path) {
            return Ok(());
        }
        let node = self.resolve(child).await?;
        match node {
            Node::Leaf { path: leaf_path, value, .. } => {
                let mut full = path.clone();
                full.extend(nibbles_of(&leaf_path));
                visitor.visit_leaf(&full, &value);
            }
            Node::Extension { path: ext_path, child: next, .. } => {
                path.extend(nibbles_of(&ext_path));
                self.traverse_inner(&next, path, visitor).await?;
                path.truncate(path.len() - ext_path.as_view().len());
            }
            Node::Branch { children, value, .. } => {
                if let Some(value) = value {
                    visitor.visit_leaf(path, &value);
                }
                for (i, child) in children.iter().enumerate() {
                    if let Some(child) = child {
                        path.push(i as u8);
                        self.traverse_inner(child, path, visitor).await?;
                        path.pop();
                    }
                }
            }
        }
        Ok(())
    }

    /// Applies `updates` against `root`, returning the new root.
    ///
    /// All-or-nothing: any write produces entirely new nodes at new
    /// locations, so a failure midway simply abandons the new root without
    /// ever registering it — the old root stays valid.
    pub async fn upsert(&self, root: Hash256, updates: &[Update]) -> MptResult<Hash256> {
        let (writes, wipes) = flatten_updates(updates);
        if writes.is_empty() {
            return Ok(root);
        }
        let existing = self.root_child_ref(root)?;
        let mut sm = self.state_machine.clone();
        let scratch = self.apply(existing, &writes, &[], &wipes, &mut sm).await?;
        let Some(scratch) = scratch else {
            return Ok(Self::empty_root());
        };
        let (new_root, location) = self.finalize_root(scratch, &mut sm).await?;
        self.roots.insert(new_root, location);
        trace!(%new_root, writes = writes.len(), "committed trie upsert");
        Ok(new_root)
    }

    fn root_child_ref(&self, root: Hash256) -> MptResult<Option<ChildRef>> {
        if root == Self::empty_root() {
            return Ok(None);
        }
        match self.roots.get(&root) {
            Some(location) => Ok(Some(match &*location {
                RootLocation::Embedded(rlp) => ChildRef::Embedded(rlp.clone()),
                RootLocation::OnDisk(offset) => ChildRef::OnDisk { hash: root, offset: *offset },
            })),
            None => Err(MptError::VersionNoLongerExists),
        }
    }

    async fn resolve(&self, child: &ChildRef) -> MptResult<Node> {
        match child {
            ChildRef::Embedded(rlp) => decode_embedded(rlp, self.state_machine.get_compute()),
            ChildRef::OnDisk { offset, .. } => {
                if let Some(cached) = self.cache.get(offset) {
                    return Ok((*cached).clone());
                }
                let buffer = self.ring.submit_read(offset.chunk_id(), offset.byte_offset(), offset.page_count_hint()).await?;
                let (node, _) = ferrochain_node_codec::deserialize(&buffer, 0)?;
                if self.state_machine.cache() {
                    self.cache.insert(*offset, Arc::new(node.clone()));
                }
                Ok(node)
            }
        }
    }

    /// Dispatches on `existing`'s resolved shape (or lack of one) and merges
    /// in `writes`, whose keys are absolute from the trie root and all
    /// start with `abs_prefix`. A wipe whose prefix exactly matches
    /// `abs_prefix` discards `existing` before merging, realizing an
    /// account incarnation bump.
    #[async_recursion]
    async fn apply(
        &self,
        existing: Option<ChildRef>,
        writes: &[FlatWrite],
        abs_prefix: &[u8],
        wipes: &[Vec<u8>],
        sm: &mut SM,
    ) -> MptResult<Option<Scratch>> {
        let existing = if wipes.iter().any(|w| w.as_slice() == abs_prefix) { None } else { existing };

        let Some(existing) = existing else {
            return Ok(build_fresh(writes, abs_prefix.len()));
        };

        match self.resolve(&existing).await? {
            Node::Leaf { path, value, .. } => Ok(apply_leaf(&nibbles_of(&path), &value, writes, abs_prefix)),
            Node::Extension { path, child, .. } => {
                sm.down(0);
                let result = self.apply_extension(&nibbles_of(&path), &child, writes, abs_prefix, wipes, sm).await;
                sm.up(1);
                result
            }
            Node::Branch { children, value, .. } => {
                sm.down(0);
                let result = self.apply_branch(&children, &value, writes, abs_prefix, wipes, sm).await;
                sm.up(1);
                result
            }
        }
    }

    /// Merges `writes` into an extension node with relative path `path`
    /// pointing to `child`. Writes that share all of `path` pass through
    /// unchanged to `child`; any divergence within `path` splits the
    /// extension at the first differing nibble and introduces a branch
    /// there.
    #[async_recursion]
    async fn apply_extension(
        &self,
        path: &[u8],
        child: &ChildRef,
        writes: &[FlatWrite],
        abs_prefix: &[u8],
        wipes: &[Vec<u8>],
        sm: &mut SM,
    ) -> MptResult<Option<Scratch>> {
        let rel_of = |w: &FlatWrite| &w.key[abs_prefix.len()..];
        let divergence = writes.iter().map(|w| common_prefix_len(rel_of(w), path)).min().unwrap_or(0).min(path.len());

        if divergence == path.len() {
            let mut child_prefix = abs_prefix.to_vec();
            child_prefix.extend_from_slice(path);
            let merged = self.apply(Some(child.clone()), writes, &child_prefix, wipes, sm).await?;
            return Ok(merged.map(|scratch| merge_with_prefix(path, scratch)));
        }

        let d = divergence;
        let mut branch_prefix = abs_prefix.to_vec();
        branch_prefix.extend_from_slice(&path[..d]);
        let divergent_nibble = path[d];
        let remaining_path = &path[d + 1..];

        let mut children: [Option<Box<Scratch>>; 16] = Default::default();
        let mut own_value = None;
        for i in 0u8..16 {
            let bucket: Vec<FlatWrite> = writes
                .iter()
                .filter(|w| {
                    let rel = rel_of(w);
                    rel.len() > d && rel[d] == i
                })
                .cloned()
                .collect();

            let result = if i == divergent_nibble {
                if bucket.is_empty() {
                    Some(continuation_scratch(remaining_path, child))
                } else if remaining_path.is_empty() {
                    let mut slot_prefix = branch_prefix.clone();
                    slot_prefix.push(i);
                    self.apply(Some(child.clone()), &bucket, &slot_prefix, wipes, sm).await?
                } else {
                    let mut slot_prefix = branch_prefix.clone();
                    slot_prefix.push(i);
                    self.apply_extension(remaining_path, child, &bucket, &slot_prefix, wipes, sm).await?
                }
            } else if !bucket.is_empty() {
                build_fresh(&bucket, branch_prefix.len() + 1)
            } else {
                None
            };
            children[i as usize] = result.map(Box::new);
        }
        for w in writes {
            let rel = rel_of(w);
            if rel.len() == d {
                own_value.clone_from(&w.value);
            }
        }
        Ok(Some(Scratch::Branch { children, value: own_value }))
    }

    /// Merges `writes` into a branch node. Untouched slots are carried over
    /// as [`Scratch::Existing`] with no I/O; touched slots recurse.
    async fn apply_branch(
        &self,
        existing_children: &[Option<ChildRef>; 16],
        existing_value: &Option<Vec<u8>>,
        writes: &[FlatWrite],
        abs_prefix: &[u8],
        wipes: &[Vec<u8>],
        sm: &mut SM,
    ) -> MptResult<Option<Scratch>> {
        let rel_of = |w: &FlatWrite| &w.key[abs_prefix.len()..];

        let mut children: [Option<Box<Scratch>>; 16] = Default::default();
        for i in 0u8..16 {
            let bucket: Vec<FlatWrite> = writes
                .iter()
                .filter(|w| {
                    let rel = rel_of(w);
                    !rel.is_empty() && rel[0] == i
                })
                .cloned()
                .collect();

            let slot = match (&existing_children[i as usize], bucket.is_empty()) {
                (existing, true) => existing.clone().map(Scratch::Existing),
                (existing, false) => {
                    let mut slot_prefix = abs_prefix.to_vec();
                    slot_prefix.push(i);
                    self.apply(existing.clone(), &bucket, &slot_prefix, wipes, sm).await?
                }
            };
            children[i as usize] = slot.map(Box::new);
        }

        let mut own_value = existing_value.clone();
        for w in writes {
            if rel_of(w).is_empty() {
                own_value.clone_from(&w.value);
            }
        }

        if children.iter().all(Option::is_none) {
            return Ok(own_value.map(|value| Scratch::Leaf { path: Vec::new(), value }));
        }
        Ok(Some(collapse_if_single_child(children, own_value)))
    }

    /// Converts a fully-built `Scratch` tree into a [`ChildRef`], writing any
    /// node whose RLP encoding exceeds [`MAX_EMBEDDED_LEN`] to disk.
    #[async_recursion]
    async fn finalize(&self, scratch: Scratch, sm: &mut SM) -> MptResult<ChildRef> {
        if let Scratch::Existing(child_ref) = scratch {
            return Ok(child_ref);
        }
        let node = self.materialize(scratch, sm).await?;
        let rlp = encode_node_rlp(&node);
        if rlp.len() <= MAX_EMBEDDED_LEN {
            Ok(ChildRef::Embedded(rlp))
        } else {
            let hash = sm.get_compute().hash(&rlp);
            let offset = self.persist(&replace_hash(node, hash), sm).await?;
            Ok(ChildRef::OnDisk { hash, offset })
        }
    }

    async fn finalize_root(&self, scratch: Scratch, sm: &mut SM) -> MptResult<(Hash256, RootLocation)> {
        if let Scratch::Existing(ChildRef::OnDisk { hash, offset }) = scratch {
            return Ok((hash, RootLocation::OnDisk(offset)));
        }
        if let Scratch::Existing(ChildRef::Embedded(rlp)) = scratch {
            let hash = sm.get_compute().hash(&rlp);
            return Ok((hash, RootLocation::Embedded(rlp)));
        }
        let node = self.materialize(scratch, sm).await?;
        let rlp = encode_node_rlp(&node);
        let hash = sm.get_compute().hash(&rlp);
        if rlp.len() <= MAX_EMBEDDED_LEN {
            Ok((hash, RootLocation::Embedded(rlp)))
        } else {
            let offset = self.persist(&replace_hash(node, hash), sm).await?;
            Ok((hash, RootLocation::OnDisk(offset)))
        }
    }

    #[async_recursion]
    async fn materialize(&self, scratch: Scratch, sm: &mut SM) -> MptResult<Node> {
        match scratch {
            Scratch::Existing(child) => self.resolve(&child).await,
            Scratch::Leaf { path, value } => {
                let path = pack_nibbles(&path);
                Ok(Node::Leaf { path, value, hash: Hash256::ZERO })
            }
            Scratch::Extension { path, child } => {
                sm.down(0);
                let child_ref = self.finalize(*child, sm).await;
                sm.up(1);
                let child_ref = child_ref?;
                Ok(Node::Extension { path: pack_nibbles(&path), child: child_ref, hash: Hash256::ZERO })
            }
            Scratch::Branch { children, value } => {
                let mut resolved: [Option<ChildRef>; 16] = Default::default();
                for (i, child) in children.into_iter().enumerate() {
                    if let Some(child) = child {
                        sm.down(i as u8);
                        let child_ref = self.finalize(*child, sm).await;
                        sm.up(1);
                        resolved[i] = Some(child_ref?);
                    }
                }
                Ok(Node::Branch { children: resolved, value, hash: Hash256::ZERO })
            }
        }
    }

    async fn persist(&self, node: &Node, _sm: &SM) -> MptResult<ChunkOffset> {
        let mut buf = Vec::new();
        serialize(node, &mut buf);
        let page_size = self.pool.config().page_size;
        let pages = node_disk_pages(buf.len(), page_size);
        let chunk_id = self.pool.allocate_chunk()?;
        self.ring.submit_write(chunk_id, 0, buf).await?;
        let offset = ChunkOffset::new(chunk_id, 0, pages as u16);
        if self.state_machine.cache() {
            self.cache.insert(offset, Arc::new(node.clone()));
        }
        Ok(offset)
    }
}

fn replace_hash(node: Node, hash: Hash256) -> Node {
    match node {
        Node::Leaf { path, value, .. } => Node::Leaf { path, value, hash },
        Node::Extension { path, child, .. } => Node::Extension { path, child, hash },
        Node::Branch { children, value, .. } => Node::Branch { children, value, hash },
    }
}

/// Builds a `Scratch` from `path` where a leaf/extension/branch result needs
/// `prefix` nibbles prepended (the collapse that happens whenever a pure
/// pass-through recursion returns through an extension).
fn merge_with_prefix(prefix: &[u8], scratch: Scratch) -> Scratch {
    match scratch {
        Scratch::Leaf { path, value } => Scratch::Leaf { path: concat(prefix, &path), value },
        Scratch::Extension { path, child } => Scratch::Extension { path: concat(prefix, &path), child },
        branch @ Scratch::Branch { .. } => Scratch::Extension { path: prefix.to_vec(), child: Box::new(branch) },
        existing @ Scratch::Existing(_) => Scratch::Extension { path: prefix.to_vec(), child: Box::new(existing) },
    }
}

/// Builds the `Scratch` representing an extension's un-rewritten
/// continuation after a split: a shortened extension if nibbles remain,
/// otherwise the child itself.
fn continuation_scratch(remaining_path: &[u8], child: &ChildRef) -> Scratch {
    if remaining_path.is_empty() {
        Scratch::Existing(child.clone())
    } else {
        Scratch::Extension { path: remaining_path.to_vec(), child: Box::new(Scratch::Existing(child.clone())) }
    }
}

/// A branch with exactly one child and no own value collapses into that
/// child with its nibble prepended, the mirror image of
/// [`merge_with_prefix`] — this is what makes deleting a branch's last
/// child collapse it into its remaining sibling.
fn collapse_if_single_child(mut children: [Option<Box<Scratch>>; 16], value: Option<Vec<u8>>) -> Scratch {
    if value.is_none() {
        let occupied: Vec<usize> = children.iter().enumerate().filter_map(|(i, c)| c.is_some().then_some(i)).collect();
        if occupied.len() == 1 {
            let nibble = occupied[0] as u8;
            let only = children[occupied[0]].take().expect("occupied");
            return merge_with_prefix(&[nibble], *only);
        }
    }
    Scratch::Branch { children, value }
}

fn apply_leaf(path: &[u8], value: &[u8], writes: &[FlatWrite], abs_prefix: &[u8]) -> Option<Scratch> {
    let rel_of = |w: &FlatWrite| &w.key[abs_prefix.len()..];
    if writes.len() == 1 && rel_of(&writes[0]) == path {
        return writes[0].value.clone().map(|value| Scratch::Leaf { path: path.to_vec(), value });
    }
    let mut combined: Vec<FlatWrite> = writes.to_vec();
    if !combined.iter().any(|w| rel_of(w) == path) {
        combined.push(FlatWrite { key: concat(abs_prefix, path), value: Some(value.to_vec()) });
    }
    build_fresh(&combined, abs_prefix.len())
}

/// Builds a subtree from scratch (no existing structure) out of `writes`,
/// whose keys all share `writes[i].key[..abs_prefix_len]`. Recognizes the
/// longest common relative prefix and factors it into an extension,
/// otherwise partitions by next nibble into a branch — the general
/// construction that naturally produces the "diverging insert splits into a
/// branch" edge case.
fn build_fresh(writes: &[FlatWrite], abs_prefix_len: usize) -> Option<Scratch> {
    let effective: Vec<&FlatWrite> = writes.iter().filter(|w| w.value.is_some()).collect();
    if effective.is_empty() {
        return None;
    }
    if effective.len() == 1 {
        let rel = &effective[0].key[abs_prefix_len..];
        return Some(Scratch::Leaf { path: rel.to_vec(), value: effective[0].value.clone().unwrap() });
    }

    let rels: Vec<&[u8]> = effective.iter().map(|w| &w.key[abs_prefix_len..]).collect();
    let mut common = rels[0].len();
    for rel in &rels[1..] {
        common = common.min(common_prefix_len(rels[0], rel));
    }

    if common > 0 {
        let prefix = rels[0][..common].to_vec();
        let inner = build_fresh(writes, abs_prefix_len + common)?;
        return Some(merge_with_prefix(&prefix, inner));
    }

    let mut children: [Option<Box<Scratch>>; 16] = Default::default();
    for i in 0u8..16 {
        let bucket: Vec<FlatWrite> = writes
            .iter()
            .filter(|w| {
                let rel = &w.key[abs_prefix_len..];
                !rel.is_empty() && rel[0] == i
            })
            .cloned()
            .collect();
        if !bucket.is_empty() {
            children[i as usize] = build_fresh(&bucket, abs_prefix_len + 1).map(Box::new);
        }
    }
    let own_value = writes.iter().find(|w| w.key.len() == abs_prefix_len).and_then(|w| w.value.clone());
    Some(Scratch::Branch { children, value: own_value })
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

fn concat(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    out.extend_from_slice(a);
    out.extend_from_slice(b);
    out
}

fn nibbles_of(path: &NodePath) -> Vec<u8> {
    let view = path.as_view();
    (0..view.len()).map(|i| view.get(i).unwrap()).collect()
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

/// Flattens an `Update` tree into absolute-keyed [`FlatWrite`]s plus the
/// list of absolute prefixes an `incarnation` bump should wipe first.
/// `sub_updates` are folded in by concatenating their relative key onto
/// their parent's, so a storage sub-trie recursion is just
/// a write at a longer path in the same flattened batch; later duplicate
/// keys win (a `HashMap` keyed by absolute path naturally gives last-write-
/// wins without the caller needing to dedupe).
fn flatten_updates(updates: &[Update]) -> (Vec<FlatWrite>, Vec<Vec<u8>>) {
    let mut writes = HashMap::new();
    let mut wipes = Vec::new();
    flatten_into(updates, &[], &mut writes, &mut wipes);
    (writes.into_iter().map(|(key, value)| FlatWrite { key, value }).collect(), wipes)
}

fn flatten_into(updates: &[Update], prefix: &[u8], writes: &mut HashMap<Vec<u8>, Option<Vec<u8>>>, wipes: &mut Vec<Vec<u8>>) {
    for update in updates {
        let abs = concat(prefix, &nibbles_of(&update.key));
        if update.incarnation {
            wipes.push(abs.clone());
        }
        if update.value.is_some() || update.sub_updates.is_empty() {
            writes.insert(abs.clone(), update.value.clone());
        }
        if !update.sub_updates.is_empty() {
            flatten_into(&update.sub_updates, &abs, writes, wipes);
        }
    }
}

trait NibbleViewExt {
    fn to_owned_bytes_vec(&self) -> Vec<u8>;
}

impl NibbleViewExt for NibbleView<'_> {
    fn to_owned_bytes_vec(&self) -> Vec<u8> {
        (0..self.len()).map(|i| self.get(i).unwrap()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::EthereumStateMachine;
    use ferrochain_storage_pool::StorageConfig;
    use tempfile::tempdir;

    struct CollectingVisitor {
        leaves: Vec<(Vec<u8>, Vec<u8>)>,
    }

    impl Visitor for CollectingVisitor {
        fn visit_leaf(&mut self, path: &[u8], value: &[u8]) {
            self.leaves.push((path.to_vec(), value.to_vec()));
        }
    }

    fn test_trie() -> (tempfile::TempDir, Trie<EthereumStateMachine>) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pool.dat");
        let config = StorageConfig { file_paths: vec![path], chunk_size: 4096, chunks_per_file: 64, page_size: 4096, hugepages: false };
        let pool = Arc::new(StoragePool::open(config).unwrap());
        let ring = IoRing::new(pool.clone(), Default::default());
        let trie = Trie::new(ring, pool, 64, EthereumStateMachine::new(4));
        (dir, trie)
    }

    fn key(nibbles: &[u8]) -> NodePath {
        let packed: Vec<u8> = nibbles.chunks(2).map(|c| (c[0] << 4) | c.get(1).copied().unwrap_or(0)).collect();
        let view = NibbleView::new(&packed).substr(0, nibbles.len());
        NodePath::from_view(&view)
    }

    fn view(nibbles: &'static [u8]) -> NibbleView<'static> {
        thread_local! {
            static PACKED: std::cell::RefCell<Vec<Vec<u8>>> = const { std::cell::RefCell::new(Vec::new()) };
        }
        let packed: Vec<u8> = nibbles.chunks(2).map(|c| (c[0] << 4) | c.get(1).copied().unwrap_or(0)).collect();
        let leaked: &'static [u8] = Box::leak(packed.into_boxed_slice());
        NibbleView::new(leaked).substr(0, nibbles.len())
    }

    #[tokio::test]
    async fn empty_trie_reads_none() {
        let (_dir, trie) = test_trie();
        let result = trie.get(Trie::<EthereumStateMachine>::empty_root(), &view(&[1, 2])).await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn single_insert_then_read_round_trips() {
        let (_dir, trie) = test_trie();
        let root = Trie::<EthereumStateMachine>::empty_root();
        let root = trie.upsert(root, &[Update::write(key(&[1, 2, 3]), vec![9, 9])]).await.unwrap();
        assert_eq!(trie.get(root, &view(&[1, 2, 3])).await.unwrap(), Some(vec![9, 9]));
        assert_eq!(trie.get(root, &view(&[1, 2, 4])).await.unwrap(), None);
    }

    #[tokio::test]
    async fn diverging_insert_splits_into_branch() {
        let (_dir, trie) = test_trie();
        let root = Trie::<EthereumStateMachine>::empty_root();
        let root = trie
            .upsert(
                root,
                &[Update::write(key(&[1, 2, 3]), vec![1]), Update::write(key(&[1, 2, 4, 5]), vec![2])],
            )
            .await
            .unwrap();
        assert_eq!(trie.get(root, &view(&[1, 2, 3])).await.unwrap(), Some(vec![1]));
        assert_eq!(trie.get(root, &view(&[1, 2, 4, 5])).await.unwrap(), Some(vec![2]));
        assert_eq!(trie.get(root, &view(&[1, 2])).await.unwrap(), None);
    }

    #[tokio::test]
    async fn deleting_last_sibling_collapses_branch() {
        let (_dir, trie) = test_trie();
        let root = Trie::<EthereumStateMachine>::empty_root();
        let root = trie
            .upsert(
                root,
                &[Update::write(key(&[1, 2, 3]), vec![1]), Update::write(key(&[1, 2, 4, 5]), vec![2])],
            )
            .await
            .unwrap();
        let root = trie.upsert(root, &[Update::erase(key(&[1, 2, 4, 5]))]).await.unwrap();
        assert_eq!(trie.get(root, &view(&[1, 2, 3])).await.unwrap(), Some(vec![1]));
        assert_eq!(trie.get(root, &view(&[1, 2, 4, 5])).await.unwrap(), None);
    }

    #[tokio::test]
    async fn erasing_only_key_returns_to_empty_root() {
        let (_dir, trie) = test_trie();
        let root = Trie::<EthereumStateMachine>::empty_root();
        let root = trie.upsert(root, &[Update::write(key(&[1]), vec![1])]).await.unwrap();
        let root = trie.upsert(root, &[Update::erase(key(&[1]))]).await.unwrap();
        assert_eq!(root, Trie::<EthereumStateMachine>::empty_root());
    }

    #[tokio::test]
    async fn sub_updates_write_under_parent_key() {
        let (_dir, trie) = test_trie();
        let root = Trie::<EthereumStateMachine>::empty_root();
        let mut account_update = Update::write(key(&[1]), vec![0xAA]);
        account_update.sub_updates.push(Update::write(key(&[2, 3]), vec![0xBB]));
        let root = trie.upsert(root, &[account_update]).await.unwrap();
        assert_eq!(trie.get(root, &view(&[1])).await.unwrap(), Some(vec![0xAA]));
        assert_eq!(trie.get(root, &view(&[1, 2, 3])).await.unwrap(), Some(vec![0xBB]));
    }

    #[tokio::test]
    async fn incarnation_wipes_storage_before_applying() {
        let (_dir, trie) = test_trie();
        let root = Trie::<EthereumStateMachine>::empty_root();
        let mut account_update = Update::write(key(&[1]), vec![0xAA]);
        account_update.sub_updates.push(Update::write(key(&[2]), vec![0x01]));
        let root = trie.upsert(root, &[account_update]).await.unwrap();
        assert_eq!(trie.get(root, &view(&[1, 2])).await.unwrap(), Some(vec![0x01]));

        let mut recreated = Update::write(key(&[1]), vec![0xCC]);
        recreated.incarnation = true;
        let root = trie.upsert(root, &[recreated]).await.unwrap();
        assert_eq!(trie.get(root, &view(&[1])).await.unwrap(), Some(vec![0xCC]));
        assert_eq!(trie.get(root, &view(&[1, 2])).await.unwrap(), None);
    }

    #[tokio::test]
    async fn old_root_stays_valid_after_a_later_upsert() {
        let (_dir, trie) = test_trie();
        let root = Trie::<EthereumStateMachine>::empty_root();
        let root1 = trie.upsert(root, &[Update::write(key(&[1]), vec![1])]).await.unwrap();
        let root2 = trie.upsert(root1, &[Update::write(key(&[1]), vec![2])]).await.unwrap();
        assert_eq!(trie.get(root1, &view(&[1])).await.unwrap(), Some(vec![1]));
        assert_eq!(trie.get(root2, &view(&[1])).await.unwrap(), Some(vec![2]));
    }

    #[tokio::test]
    async fn many_inserts_force_on_disk_nodes_and_still_round_trip() {
        let (_dir, trie) = test_trie();
        let mut root = Trie::<EthereumStateMachine>::empty_root();
        let mut updates = Vec::new();
        for i in 0u8..40 {
            let nibbles = vec![i % 16, i / 16, i, i.wrapping_add(7)];
            let packed: Vec<u8> = nibbles.chunks(2).map(|c| (c[0] << 4) | c.get(1).copied().unwrap_or(0)).collect();
            let view = NibbleView::new(&packed).substr(0, nibbles.len());
            updates.push(Update::write(NodePath::from_view(&view), vec![i; 40]));
        }
        root = trie.upsert(root, &updates).await.unwrap();
        for i in 0u8..40 {
            let nibbles = vec![i % 16, i / 16, i, i.wrapping_add(7)];
            let packed: Vec<u8> = nibbles.chunks(2).map(|c| (c[0] << 4) | c.get(1).copied().unwrap_or(0)).collect();
            let v = NibbleView::new(&packed).substr(0, nibbles.len());
            assert_eq!(trie.get(root, &v).await.unwrap(), Some(vec![i; 40]));
        }
    }

    #[tokio::test]
    async fn traverse_visits_every_leaf() {
        let (_dir, trie) = test_trie();
        let root = Trie::<EthereumStateMachine>::empty_root();
        let root = trie
            .upsert(
                root,
                &[Update::write(key(&[1, 2, 3]), vec![1]), Update::write(key(&[1, 2, 4, 5]), vec![2])],
            )
            .await
            .unwrap();
        let mut visitor = CollectingVisitor { leaves: Vec::new() };
        trie.traverse(root, &view(&[]), &mut visitor).await.unwrap();
        assert_eq!(visitor.leaves.len(), 2);
    }

    #[tokio::test]
    async fn unknown_root_is_version_no_longer_exists() {
        let (_dir, trie) = test_trie();
        let result = trie.get(Hash256::repeat_byte(0x42), &view(&[1])).await;
        assert!(matches!(result, Err(MptError::VersionNoLongerExists)));
    }
}
