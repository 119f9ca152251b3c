//! A versioned, copy-on-write Merkle Patricia Trie over the storage pool,
//! node codec and async I/O ring, plus the per-level [`StateMachine`] policy
//! that lets the state trie, storage sub-tries and internal indices share
//! one traversal core.

mod cache;
pub use cache::NodeCache;

mod errors;
pub use errors::{MptError, MptResult};

mod rlp;
pub use rlp::{decode_embedded, encode_node_rlp, hex_prefix};

mod state_machine;
pub use state_machine::{Compute, EthereumStateMachine, StateMachine};

mod trie;
pub use trie::{Trie, Visitor};

mod update;
pub use update::Update;
