//! The in-memory [`Node`] shape that [`crate::serialize`]/[`crate::deserialize`]
//! convert to and from the on-disk layout.

use ferrochain_primitives::{Hash256, NibbleView};
use ferrochain_storage_pool::ChunkOffset;

/// An owned nibble path, as produced by [`NibbleView::to_owned_bytes`].
///
/// Nodes need to own their path (they outlive the traversal that produced
/// them), whereas [`NibbleView`] is a borrow used for the hot traversal path;
/// this is the owned counterpart the codec reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePath {
    /// Packed nibbles, two per byte, the final nibble zero-padded if `len`
    /// is odd.
    pub packed: Vec<u8>,
    /// The number of nibbles `packed` encodes.
    pub len: usize,
}

impl NodePath {
    /// Packs `view` into an owned path.
    pub fn from_view(view: &NibbleView<'_>) -> Self {
        let (packed, len) = view.to_owned_bytes();
        Self { packed, len }
    }

    /// Borrows this path as a [`NibbleView`].
    pub fn as_view(&self) -> NibbleView<'_> {
        NibbleView::new(&self.packed).substr(0, self.len)
    }

    /// Bytes needed to pack `len` nibbles.
    pub const fn packed_len(nibble_len: usize) -> usize {
        nibble_len.div_ceil(2)
    }
}

/// The maximum byte length of a child's RLP encoding that may be embedded
/// directly in its parent's descriptor instead of hashed and stored
/// separately, per the standard MPT embedding rule.
pub const MAX_EMBEDDED_LEN: usize = 31;

/// A reference to a child subtree: either its RLP encoding embedded inline
/// (small enough, per [`MAX_EMBEDDED_LEN`], that the parent doesn't need a
/// disk read to use it as Merkle input) or the child's Merkle hash paired
/// with a [`ChunkOffset`] so a reader can fetch it without a separate
/// hash-indexed lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildRef {
    /// The child's raw RLP encoding, at most [`MAX_EMBEDDED_LEN`] bytes.
    Embedded(Vec<u8>),
    /// The child's Merkle hash (used as this descriptor's contribution to
    /// the parent's own RLP encoding) plus its on-disk location.
    OnDisk {
        /// The child subtree's cached Merkle hash.
        hash: Hash256,
        /// Where the child node is stored.
        offset: ChunkOffset,
    },
}

/// One node of the trie, as materialized in memory.
///
/// Every variant carries a cached Merkle hash; any mutation that changes a
/// subtree must recompute or invalidate every ancestor's hash before the
/// owning commit returns. The codec only reads and writes the
/// cached value, it never computes it — that's `ferrochain-mpt`'s job, since
/// which hash function applies is a [`ferrochain_primitives::Revision`]- and
/// state-machine-level policy (`get_compute`), not a codec concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A terminal node: a partial path plus the value stored at it.
    Leaf {
        /// The partial nibble path from this node's parent.
        path: NodePath,
        /// The value bytes stored at this leaf.
        value: Vec<u8>,
        /// This node's cached Merkle hash.
        hash: Hash256,
    },
    /// A single-child pointer node compressing a run of branches with only
    /// one populated child.
    Extension {
        /// The partial nibble path this extension compresses.
        path: NodePath,
        /// The single child this extension points to.
        child: ChildRef,
        /// This node's cached Merkle hash.
        hash: Hash256,
    },
    /// A 16-wide fan-out node, optionally also terminal (a value stored at
    /// the branch itself, for keys that end exactly here).
    Branch {
        /// The children present at each of the 16 nibble slots.
        children: [Option<ChildRef>; 16],
        /// A value stored at this branch, if any key ends here.
        value: Option<Vec<u8>>,
        /// This node's cached Merkle hash.
        hash: Hash256,
    },
}

impl Node {
    /// This node's cached Merkle hash.
    pub const fn hash(&self) -> &Hash256 {
        match self {
            Self::Leaf { hash, .. } | Self::Extension { hash, .. } | Self::Branch { hash, .. } => hash,
        }
    }

    /// The bitmap of populated child slots for a [`Node::Branch`]; `0` for
    /// every other variant.
    pub fn child_mask(&self) -> u16 {
        match self {
            Self::Branch { children, .. } => {
                children.iter().enumerate().fold(0u16, |mask, (i, c)| if c.is_some() { mask | (1 << i) } else { mask })
            }
            _ => 0,
        }
    }
}
