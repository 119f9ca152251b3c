//! [`BlockState`]: the per-block mutable accumulator every transaction in
//! the block reads through and merges into.

use crate::{
    delta::{StateDelta, TxStateChanges},
    errors::BlockStateResult,
};
use dashmap::DashMap;
use ferrochain_primitives::{Account, Address, Code, Hash256, Incarnation, U256};
use ferrochain_triedb::Triedb;
use std::sync::Arc;

/// Holds every address and code hash touched so far this block, read
/// through to [`Triedb`] on a miss. Reads are lock-free; [`Self::merge`] is
/// serialized by the caller (the executor's single-threaded commit phase) —
/// concurrent `merge` calls on the same address would race on its
/// read-modify-write, so nothing here takes a lock across the two.
pub struct BlockState {
    state: DashMap<Address, StateDelta>,
    code: DashMap<Hash256, Code>,
    triedb: Arc<Triedb>,
}

impl BlockState {
    /// Starts a fresh accumulator over `triedb`, empty until transactions
    /// merge into it.
    pub fn new(triedb: Arc<Triedb>) -> Self {
        Self { state: DashMap::new(), code: DashMap::new(), triedb }
    }

    /// Reads an account's current logical state: this block's delta if the
    /// address has been merged already, else a read-through to Triedb.
    pub async fn read_account(&self, address: Address) -> BlockStateResult<Option<Account>> {
        if let Some(delta) = self.state.get(&address) {
            return Ok(delta.after.clone());
        }
        Ok(self.triedb.read_account(address).await?)
    }

    /// The incarnation a read of `address`'s storage should be tagged with
    /// right now: this block's delta if merged already, else whatever
    /// Triedb has on record.
    pub fn current_incarnation(&self, address: Address) -> Incarnation {
        self.state.get(&address).map(|delta| delta.incarnation).unwrap_or_default()
    }

    /// Reads a storage slot for `address` at `incarnation`: this block's
    /// delta if the slot has been merged already under a matching
    /// incarnation, else a read-through to Triedb.
    pub async fn read_storage(&self, address: Address, incarnation: Incarnation, slot: U256) -> BlockStateResult<U256> {
        if let Some(delta) = self.state.get(&address) {
            if delta.incarnation == incarnation {
                if let Some(value) = delta.storage.get(&slot) {
                    return Ok(*value);
                }
                return Ok(self.triedb.read_storage(address, incarnation, slot).await?);
            }
        }
        Ok(self.triedb.read_storage(address, incarnation, slot).await?)
    }

    /// Reads code by hash: this block's newly deployed code if present,
    /// else a read-through to Triedb.
    pub async fn read_code(&self, code_hash: Hash256) -> BlockStateResult<Option<Code>> {
        if let Some(code) = self.code.get(&code_hash) {
            return Ok(Some(code.clone()));
        }
        Ok(self.triedb.read_code(code_hash).await?)
    }

    /// Whether `changes` can merge cleanly: every address and storage slot
    /// it touched must still read, right now, the same value the
    /// transaction observed when it started (`original`). A mismatch means
    /// an intervening transaction committed a conflicting write and this
    /// transaction must re-execute against the now-current state.
    pub async fn can_merge(&self, changes: &TxStateChanges) -> BlockStateResult<bool> {
        for account in &changes.accounts {
            if self.read_account(account.address).await? != account.original {
                return Ok(false);
            }
        }
        for storage in &changes.storage {
            let incarnation = self.current_incarnation(storage.address);
            if self.read_storage(storage.address, incarnation, storage.slot).await? != storage.original {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Merges `changes` into this block's state, overwriting the `after`
    /// side of every address and slot it touched. Assumes
    /// [`Self::can_merge`] was just checked and returned `true`; callers
    /// must serialize `merge` calls with respect to `can_merge` checks for
    /// the same addresses (the executor's single commit-order phase).
    pub fn merge(&self, changes: TxStateChanges) {
        for account in changes.accounts {
            let mut entry = self.state.entry(account.address).or_default();
            if account.incarnation_bump {
                entry.incarnation = entry.incarnation.bump_tx();
                entry.storage.clear();
            }
            entry.after = account.current;
        }
        for storage in changes.storage {
            let mut entry = self.state.entry(storage.address).or_default();
            entry.storage.insert(storage.slot, storage.current);
        }
        for code in changes.code {
            self.code.insert(code.hash(), code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::AccountChange;
    use ferrochain_io_ring::IoRing;
    use ferrochain_storage_pool::{StorageConfig, StoragePool};
    use ferrochain_triedb::TriedbConfig;
    use tempfile::tempdir;

    fn test_block_state() -> (tempfile::TempDir, BlockState) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pool.dat");
        let config =
            StorageConfig { file_paths: vec![path], chunk_size: 4096, chunks_per_file: 64, page_size: 4096, hugepages: false };
        let pool = Arc::new(StoragePool::open(config).unwrap());
        let ring = IoRing::new(pool.clone(), Default::default());
        let triedb = Arc::new(Triedb::new(ring, pool, TriedbConfig::default()));
        (dir, BlockState::new(triedb))
    }

    #[tokio::test]
    async fn unmerged_address_reads_through_to_triedb_as_none() {
        let (_dir, state) = test_block_state();
        let addr = Address::repeat_byte(0x11);
        assert_eq!(state.read_account(addr).await.unwrap(), None);
    }

    #[tokio::test]
    async fn merge_makes_an_account_visible_to_later_reads() {
        let (_dir, state) = test_block_state();
        let addr = Address::repeat_byte(0x22);
        let account = Account { balance: U256::from(500u64), nonce: 1, ..Default::default() };

        let changes = TxStateChanges {
            accounts: vec![AccountChange { address: addr, original: None, current: Some(account.clone()), incarnation_bump: false }],
            ..Default::default()
        };
        assert!(state.can_merge(&changes).await.unwrap());
        state.merge(changes);

        let read_back = state.read_account(addr).await.unwrap().unwrap();
        assert_eq!(read_back.balance, U256::from(500u64));
    }

    #[tokio::test]
    async fn can_merge_rejects_a_stale_original_read() {
        let (_dir, state) = test_block_state();
        let addr = Address::repeat_byte(0x33);
        let first = Account { balance: U256::from(10u64), ..Default::default() };
        let second = Account { balance: U256::from(20u64), ..Default::default() };

        state.merge(TxStateChanges {
            accounts: vec![AccountChange { address: addr, original: None, current: Some(first.clone()), incarnation_bump: false }],
            ..Default::default()
        });

        let stale = TxStateChanges {
            accounts: vec![AccountChange { address: addr, original: None, current: Some(second), incarnation_bump: false }],
            ..Default::default()
        };
        assert!(!state.can_merge(&stale).await.unwrap());
    }

    #[tokio::test]
    async fn storage_merge_is_scoped_to_its_incarnation() {
        let (_dir, state) = test_block_state();
        let addr = Address::repeat_byte(0x44);
        let slot = U256::from(1u64);

        state.merge(TxStateChanges {
            storage: vec![StorageChange { address: addr, slot, original: U256::ZERO, current: U256::from(7u64) }],
            ..Default::default()
        });
        assert_eq!(state.read_storage(addr, Incarnation::default(), slot).await.unwrap(), U256::from(7u64));

        let bumped = state.current_incarnation(addr).bump_tx();
        assert_eq!(state.read_storage(addr, bumped, slot).await.unwrap(), U256::ZERO);
    }
}
