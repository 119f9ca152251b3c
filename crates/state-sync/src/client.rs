//! [`StateSyncClient`]: drives a full sync by walking every shard,
//! verifying each one, and committing it into the local Triedb.

use crate::{
    digest::shard_digest,
    errors::{StateSyncError, StateSyncResult},
    peer::PeerSet,
    prefix::shards,
    protocol::{ServerMessage, ShardRequest},
};
use ferrochain_block_hash::BlockHashRing;
use ferrochain_primitives::{Address, Hash256, Incarnation, U256};
use ferrochain_triedb::{AccountDelta, BlockCommit, Triedb};
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};
use tracing::{info, warn};

/// Bulk-imports a finalized state snapshot into a local [`Triedb`] by
/// trie-prefix shard, verifying each shard's digest before committing it and
/// the overall recomputed root once every shard has landed.
pub struct StateSyncClient<P: PeerSet> {
    triedb: Arc<Triedb>,
    peers: P,
    block_hashes: Option<Arc<RwLock<BlockHashRing>>>,
    max_retries_per_shard: usize,
}

impl<P: PeerSet> StateSyncClient<P> {
    /// Builds a client syncing into `triedb` through `peers`, retrying a
    /// failed shard against a different peer up to `max_retries_per_shard`
    /// times. `block_hashes`, if given, is populated from any
    /// `UpsertHeader` messages the sync receives.
    pub fn new(triedb: Arc<Triedb>, peers: P, max_retries_per_shard: usize, block_hashes: Option<Arc<RwLock<BlockHashRing>>>) -> Self {
        Self { triedb, peers, block_hashes, max_retries_per_shard }
    }

    /// Syncs every `16^k` shard of the key space to `target_root`, then
    /// verifies the local Triedb's recomputed state root matches it. On
    /// success, the caller's Triedb is ready to serve normal reads and the
    /// driver can resume block processing.
    pub async fn sync(&self, target_root: Hash256, k: u32, from: u64, until: u64) -> StateSyncResult<()> {
        let mut block_number = 0u64;
        for prefix in shards(k) {
            let request = ShardRequest { prefix: prefix.clone(), target_root, from, until };
            let upserts = self.fetch_shard(&request).await?;
            block_number += 1;
            self.commit_shard(block_number, upserts).await?;
            info!(nibbles = ?prefix.nibbles(), block_number, "state-sync shard committed");
        }

        if self.triedb.state_root() != target_root {
            return Err(StateSyncError::RootMismatch);
        }
        Ok(())
    }

    /// Fetches one shard, retrying against a different peer on a digest or
    /// reported-failure mismatch, until it succeeds or peers are exhausted.
    async fn fetch_shard(&self, request: &ShardRequest) -> StateSyncResult<Vec<ServerMessage>> {
        let mut excluded = Vec::new();
        let mut attempts = 0;
        loop {
            let Some((peer_id, server)) = self.peers.pick(&excluded).await else {
                return Err(StateSyncError::NoPeersLeft);
            };

            let response = server.stream_shard(request.clone()).await;
            match response.and_then(|messages| verify_shard(&request.prefix, messages)) {
                Ok(upserts) => return Ok(upserts),
                Err(err) => {
                    warn!(peer_id, attempts, %err, "shard verification failed, retrying with a different peer");
                    excluded.push(peer_id);
                    attempts += 1;
                    if attempts > self.max_retries_per_shard {
                        return Err(err);
                    }
                }
            }
        }
    }

    async fn commit_shard(&self, block_number: u64, upserts: Vec<ServerMessage>) -> StateSyncResult<()> {
        let mut accounts: HashMap<Address, (ferrochain_triedb::AccountRlp, Vec<(U256, U256)>)> = HashMap::new();
        let mut code = Vec::new();

        for message in upserts {
            match message {
                ServerMessage::UpsertAccount { address, account } => {
                    accounts.entry(address).or_insert_with(|| (account, Vec::new())).0 = account;
                }
                ServerMessage::UpsertStorage { address, slot, value } => {
                    accounts.entry(address).or_insert_with(Default::default).1.push((slot, value));
                }
                ServerMessage::UpsertCode { code: blob } => code.push(blob),
                ServerMessage::UpsertHeader { header } => {
                    if let Some(ring) = &self.block_hashes {
                        ring.write().set(header.number, header.hash_slow());
                    }
                }
                ServerMessage::Done { .. } => {}
            }
        }

        let account_deltas = accounts
            .into_iter()
            .map(|(address, (rlp, storage))| AccountDelta {
                address,
                account: Some(rlp.to_account(Incarnation::default())),
                storage,
                incarnation_bump: false,
            })
            .collect();

        let commit = BlockCommit { block_number, accounts: account_deltas, code, ..Default::default() };
        self.triedb.commit(commit).await?;
        Ok(())
    }
}

/// Checks a shard's response against its own trailing [`ServerMessage::Done`]:
/// the reported `success` flag, the upsert count, and the digest recomputed
/// from the upserts actually received.
fn verify_shard(prefix: &crate::prefix::ShardPrefix, mut messages: Vec<ServerMessage>) -> StateSyncResult<Vec<ServerMessage>> {
    let Some(ServerMessage::Done { success, count, shard_digest: reported_digest, .. }) = messages.pop() else {
        return Err(StateSyncError::Peer("shard response did not end with a Done message".into()));
    };
    if !success {
        return Err(StateSyncError::Peer("peer reported shard failure".into()));
    }
    if messages.len() as u64 != count {
        return Err(StateSyncError::Peer(format!("peer reported {count} upserts but sent {}", messages.len())));
    }
    if shard_digest(prefix, &messages) != reported_digest {
        return Err(StateSyncError::Peer("shard digest mismatch".into()));
    }
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::StateSyncServer;
    use async_trait::async_trait;
    use ferrochain_io_ring::IoRing;
    use ferrochain_storage_pool::{StorageConfig, StoragePool};
    use ferrochain_triedb::{AccountRlp, TriedbConfig};
    use std::collections::HashMap as StdHashMap;
    use tempfile::tempdir;

    struct FakeServer {
        responses: StdHashMap<Vec<u8>, Vec<ServerMessage>>,
        /// Peers in this set whose every response is swapped for a
        /// deliberately wrong digest, to exercise the retry path.
        corrupt: bool,
    }

    #[async_trait]
    impl StateSyncServer for FakeServer {
        async fn stream_shard(&self, request: ShardRequest) -> StateSyncResult<Vec<ServerMessage>> {
            let mut upserts = self.responses.get(request.prefix.nibbles()).cloned().unwrap_or_default();
            let mut digest = shard_digest(&request.prefix, &upserts);
            if self.corrupt {
                digest = Hash256::repeat_byte(0xff);
            }
            let count = upserts.len() as u64;
            upserts.push(ServerMessage::Done { success: true, prefix: request.prefix, count, shard_digest: digest });
            Ok(upserts)
        }
    }

    struct FixedPeerSet {
        peers: Vec<(u64, Arc<dyn StateSyncServer>)>,
    }

    #[async_trait]
    impl PeerSet for FixedPeerSet {
        async fn pick(&self, exclude: &[u64]) -> Option<(u64, Arc<dyn StateSyncServer>)> {
            self.peers.iter().find(|(id, _)| !exclude.contains(id)).map(|(id, server)| (*id, server.clone()))
        }
    }

    fn test_triedb() -> (tempfile::TempDir, Arc<Triedb>) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pool.dat");
        let config =
            StorageConfig { file_paths: vec![path], chunk_size: 4096, chunks_per_file: 64, page_size: 4096, hugepages: false };
        let pool = Arc::new(StoragePool::open(config).unwrap());
        let ring = IoRing::new(pool.clone(), Default::default());
        (dir, Arc::new(Triedb::new(ring, pool, TriedbConfig::default())))
    }

    fn single_account_shard() -> (Address, StdHashMap<Vec<u8>, Vec<ServerMessage>>) {
        let address = Address::repeat_byte(0x11);
        let account = AccountRlp { nonce: 1, balance: U256::from(100u64), ..Default::default() };
        let mut responses = StdHashMap::new();
        responses.insert(Vec::new(), vec![ServerMessage::UpsertAccount { address, account }]);
        (address, responses)
    }

    /// Runs an honest, single-peer sync from scratch and returns the
    /// resulting state root, to stand in for the root a client would learn
    /// out-of-band (from a consensus proof, a trusted checkpoint, etc.).
    async fn reference_root(responses: StdHashMap<Vec<u8>, Vec<ServerMessage>>) -> Hash256 {
        let (_dir, triedb) = test_triedb();
        let server: Arc<dyn StateSyncServer> = Arc::new(FakeServer { responses, corrupt: false });
        let peers = FixedPeerSet { peers: vec![(1, server)] };
        let client = StateSyncClient::new(triedb.clone(), peers, 0, None);
        client.sync(triedb.state_root(), 0, 0, 0).await.unwrap();
        triedb.state_root()
    }

    #[tokio::test]
    async fn syncs_a_single_shard_and_matches_the_target_root() {
        let (address, responses) = single_account_shard();
        let target_root = reference_root(responses.clone()).await;

        let (_dir, triedb) = test_triedb();
        let server: Arc<dyn StateSyncServer> = Arc::new(FakeServer { responses, corrupt: false });
        let peers = FixedPeerSet { peers: vec![(1, server)] };
        let client = StateSyncClient::new(triedb.clone(), peers, 0, None);

        client.sync(target_root, 0, 0, 0).await.unwrap();

        let read_back = triedb.read_account(address).await.unwrap().unwrap();
        assert_eq!(read_back.nonce, 1);
    }

    #[tokio::test]
    async fn a_corrupt_peer_is_retried_against_a_different_peer() {
        let (_, responses) = single_account_shard();
        let target_root = reference_root(responses.clone()).await;

        let (_dir, triedb) = test_triedb();
        let bad: Arc<dyn StateSyncServer> = Arc::new(FakeServer { responses: responses.clone(), corrupt: true });
        let good: Arc<dyn StateSyncServer> = Arc::new(FakeServer { responses, corrupt: false });
        let peers = FixedPeerSet { peers: vec![(1, bad), (2, good)] };
        let client = StateSyncClient::new(triedb.clone(), peers, 1, None);

        client.sync(target_root, 0, 0, 0).await.unwrap();
        assert_eq!(triedb.state_root(), target_root);
    }

    #[tokio::test]
    async fn exhausting_every_peer_without_success_fails_the_sync() {
        let (_, responses) = single_account_shard();
        let (_dir, triedb) = test_triedb();
        let bad: Arc<dyn StateSyncServer> = Arc::new(FakeServer { responses, corrupt: true });
        let peers = FixedPeerSet { peers: vec![(1, bad)] };
        let client = StateSyncClient::new(triedb, peers, 1, None);

        let err = client.sync(Hash256::repeat_byte(0x99), 0, 0, 0).await.unwrap_err();
        assert!(matches!(err, StateSyncError::Peer(_)));
    }
}
