//! [`Update`]: one entry in an [`crate::Trie::upsert`] batch.

use ferrochain_node_codec::NodePath;

/// One requested change to a trie, keyed by a full nibble path from the
/// root.
///
/// `value = Some(x)` writes a leaf at `key`. `value = None` with no
/// `sub_updates` erases whatever leaf is at `key`. Non-empty `sub_updates`
/// recurses into a sub-trie rooted at `key` (e.g. an account's storage
/// trie), with each sub-update's own key taken as relative to `key`.
#[derive(Debug, Clone)]
pub struct Update {
    /// The full nibble path from the trie root to this update's target.
    pub key: NodePath,
    /// The new value to write, or `None` to erase.
    pub value: Option<Vec<u8>>,
    /// Updates to recurse into a storage sub-trie rooted at `key`.
    pub sub_updates: Vec<Update>,
    /// When `true`, the sub-trie rooted at `key` is wiped before this
    /// update's own writes are applied — used when an account is
    /// self-destructed and recreated within the same block.
    pub incarnation: bool,
}

impl Update {
    /// A leaf write with no sub-updates and no incarnation bump.
    pub fn write(key: NodePath, value: Vec<u8>) -> Self {
        Self { key, value: Some(value), sub_updates: Vec::new(), incarnation: false }
    }

    /// An erase with no sub-updates.
    pub fn erase(key: NodePath) -> Self {
        Self { key, value: None, sub_updates: Vec::new(), incarnation: false }
    }

    /// Whether this update, applied alone, deletes the leaf at `key`.
    pub fn is_erase(&self) -> bool {
        self.value.is_none() && self.sub_updates.is_empty()
    }
}
