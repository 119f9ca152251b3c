//! Page-aligned binary encoding of trie nodes.
//!
//! Generalizes kona-mpt's pure-RLP `TrieNode::decode` into a codec with an
//! explicit binary header in front of the payload, so a node's disk size
//! (and therefore its page count) is known without re-parsing RLP.

mod codec;
pub use codec::{deserialize, node_disk_pages, serialize};

mod errors;
pub use errors::{CodecError, CodecResult};

mod node;
pub use node::{ChildRef, Node, NodePath, MAX_EMBEDDED_LEN};
