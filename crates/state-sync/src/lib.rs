//! Bulk transfer of a committed state snapshot by trie-prefix shard: divide
//! the hashed key space into `16^k` shards, fetch each from a peer, verify
//! it, and commit it into a local [`ferrochain_triedb::Triedb`].
//!
//! The wire transport itself (sockets, framing, peer discovery) is an
//! external collaborator; this crate models the protocol's logic —
//! [`ShardRequest`]/[`ServerMessage`] message shapes, [`StateSyncServer`] as
//! the thing a peer queries, [`PeerSet`] for retry-with-exclusion, and
//! [`StateSyncClient`] driving the whole sync to completion.

mod client;
mod digest;
mod errors;
mod peer;
mod prefix;
mod protocol;
mod server;

pub use client::StateSyncClient;
pub use digest::shard_digest;
pub use errors::{StateSyncError, StateSyncResult};
pub use peer::{PeerId, PeerSet};
pub use prefix::{shards, ShardPrefix};
pub use protocol::{ServerMessage, ShardRequest};
pub use server::StateSyncServer;
