//! [`PeerSet`]: how the client picks a peer to serve a shard, excluding
//! ones that already failed it this sync.

use crate::server::StateSyncServer;
use async_trait::async_trait;
use std::sync::Arc;

/// Identifies one peer within a [`PeerSet`]. Opaque to this crate — a real
/// implementation might key peers by network address or node id.
pub type PeerId = u64;

/// A pool of peers the client can request shards from, able to exclude
/// peers that already failed a shard so a retry lands somewhere new.
#[async_trait]
pub trait PeerSet: Send + Sync {
    /// Picks a peer not in `exclude`, or `None` if every peer has been
    /// excluded.
    async fn pick(&self, exclude: &[PeerId]) -> Option<(PeerId, Arc<dyn StateSyncServer>)>;
}
