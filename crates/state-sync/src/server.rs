//! The server side of the shard protocol: something a peer queries for one
//! shard's worth of state.
//!
//! This crate models the protocol's logic only, not its wire transport —
//! whatever carries [`ShardRequest`]/[`ServerMessage`] bytes between
//! processes (QUIC, libp2p, a test channel) is an external collaborator
//! that implements this trait.

use crate::{errors::StateSyncResult, protocol::{ServerMessage, ShardRequest}};
use async_trait::async_trait;

/// Serves one shard of state at a time. A real implementation streams
/// messages as it produces them; this trait collects them into one batch
/// since the transport and backpressure strategy are out of scope here.
#[async_trait]
pub trait StateSyncServer: Send + Sync {
    /// Answers `request`, returning every upsert message followed
    /// implicitly by the caller wrapping a [`ServerMessage::Done`] (callers
    /// use [`crate::digest::shard_digest`] against the returned upserts to
    /// fill in `shard_digest` themselves, keeping this trait's contract to
    /// just "what data does this shard contain").
    async fn stream_shard(&self, request: ShardRequest) -> StateSyncResult<Vec<ServerMessage>>;
}
