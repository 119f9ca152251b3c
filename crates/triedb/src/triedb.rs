//! [`Triedb`]: the typed account/storage/code facade over the trie.

use crate::{
    account::AccountRlp,
    config::TriedbConfig,
    errors::TriedbResult,
    ordered::ordered_trie_root,
};
use alloy_primitives::{keccak256, Bytes};
use dashmap::DashMap;
use ferrochain_io_ring::IoRing;
use ferrochain_mpt::{EthereumStateMachine, Trie, Update};
use ferrochain_node_codec::NodePath;
use ferrochain_primitives::{Account, Address, Code, Hash256, Incarnation, NibbleView, U256};
use ferrochain_storage_pool::StoragePool;
use parking_lot::RwLock;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tracing::info;

fn hash_address(address: Address) -> NodePath {
    let hash = keccak256(address);
    NodePath::from_view(&NibbleView::new(hash.as_slice()))
}

fn hash_slot(slot: U256) -> NodePath {
    let hash = keccak256(slot.to_be_bytes::<32>());
    NodePath::from_view(&NibbleView::new(hash.as_slice()))
}

/// One account's change within a block: `account = None` erases the account
/// (self-destruct); `incarnation_bump` wipes its storage sub-trie before any
/// of `storage`'s writes are applied.
#[derive(Debug, Clone)]
pub struct AccountDelta {
    /// The account being changed.
    pub address: Address,
    /// The account's new logical state, or `None` to erase it.
    pub account: Option<Account>,
    /// Storage slot writes, applied after any incarnation wipe.
    pub storage: Vec<(U256, U256)>,
    /// Whether to wipe the account's existing storage before applying
    /// `storage` (self-destruct followed by recreation within the block).
    pub incarnation_bump: bool,
}

/// Everything needed to advance the Triedb by one block.
#[derive(Debug, Clone, Default)]
pub struct BlockCommit {
    /// The block number being committed.
    pub block_number: u64,
    /// Per-account state and storage changes.
    pub accounts: Vec<AccountDelta>,
    /// Newly deployed code, keyed implicitly by its own keccak hash.
    pub code: Vec<Code>,
    /// RLP/EIP-2718-encoded receipts, in transaction order.
    pub receipts: Vec<Bytes>,
    /// Raw encoded transactions, in block order.
    pub transactions: Vec<Bytes>,
    /// RLP-encoded withdrawals, if the active revision has any.
    pub withdrawals: Vec<Bytes>,
}

struct Roots {
    state: Hash256,
    code: Hash256,
    receipts: Hash256,
    transactions: Hash256,
    withdrawals: Hash256,
}

/// The versioned account/storage/code facade the executor and state-sync
/// reader read and write through.
///
/// Account storage lives in one shared storage trie keyed by
/// `keccak(slot)`, addressed per-call by whatever `storage_root` the
/// account's own [`AccountRlp`] currently carries — [`Trie`] takes its root
/// as a call parameter rather than holding one, so one trie instance serves
/// every account's storage without needing a trie-per-account.
pub struct Triedb {
    accounts: Trie<EthereumStateMachine>,
    storage: Trie<EthereumStateMachine>,
    code: Trie<EthereumStateMachine>,
    incarnations: DashMap<Address, Incarnation>,
    roots: RwLock<Roots>,
    block_number: AtomicU64,
    round: RwLock<Option<u64>>,
    finalized_block: AtomicU64,
    verified_block: AtomicU64,
}

impl Triedb {
    /// Opens a Triedb over `pool`/`ring`, with separate node caches for the
    /// account/storage trie and the code-by-hash trie per `config`.
    pub fn new(ring: IoRing, pool: Arc<StoragePool>, config: TriedbConfig) -> Self {
        let sm = EthereumStateMachine::new(8);
        let accounts = Trie::new(ring.clone(), pool.clone(), config.account_cache_capacity, sm.clone());
        let storage = Trie::new(ring.clone(), pool.clone(), config.account_cache_capacity, sm.clone());
        let code = Trie::new(ring, pool, config.code_cache_capacity, sm);
        let empty = Trie::<EthereumStateMachine>::empty_root();
        Self {
            accounts,
            storage,
            code,
            incarnations: DashMap::new(),
            roots: RwLock::new(Roots {
                state: empty,
                code: empty,
                receipts: alloy_consensus::EMPTY_ROOT_HASH,
                transactions: alloy_consensus::EMPTY_ROOT_HASH,
                withdrawals: alloy_consensus::EMPTY_ROOT_HASH,
            }),
            block_number: AtomicU64::new(0),
            round: RwLock::new(None),
            finalized_block: AtomicU64::new(0),
            verified_block: AtomicU64::new(0),
        }
    }

    /// The current state root, i.e. the account trie's root after the most
    /// recent [`Self::commit`].
    pub fn state_root(&self) -> Hash256 {
        self.roots.read().state
    }

    /// The most recently committed block's receipts root.
    pub fn receipts_root(&self) -> Hash256 {
        self.roots.read().receipts
    }

    /// The most recently committed block's transactions root.
    pub fn transactions_root(&self) -> Hash256 {
        self.roots.read().transactions
    }

    /// The most recently committed block's withdrawals root.
    pub fn withdrawals_root(&self) -> Hash256 {
        self.roots.read().withdrawals
    }

    /// Reads an account's logical state at the current state root.
    pub async fn read_account(&self, address: Address) -> TriedbResult<Option<Account>> {
        let key = hash_address(address);
        let Some(bytes) = self.accounts.get(self.state_root(), &key.as_view()).await? else {
            return Ok(None);
        };
        let rlp = AccountRlp::decode_account(&bytes)?;
        let incarnation = self.incarnations.get(&address).map(|v| *v).unwrap_or_default();
        Ok(Some(rlp.to_account(incarnation)))
    }

    async fn read_account_rlp(&self, address: Address) -> TriedbResult<Option<AccountRlp>> {
        let key = hash_address(address);
        let Some(bytes) = self.accounts.get(self.state_root(), &key.as_view()).await? else {
            return Ok(None);
        };
        Ok(Some(AccountRlp::decode_account(&bytes)?))
    }

    /// Reads a storage slot for `address` at `incarnation`. Returns zero,
    /// per the storage invariant that a stale incarnation's reads never
    /// observe a newer incarnation's writes, if `incarnation` doesn't match
    /// the account's current incarnation.
    pub async fn read_storage(&self, address: Address, incarnation: Incarnation, slot: U256) -> TriedbResult<U256> {
        let current = self.incarnations.get(&address).map(|v| *v).unwrap_or_default();
        if current != incarnation {
            return Ok(U256::ZERO);
        }
        let Some(account) = self.read_account_rlp(address).await? else {
            return Ok(U256::ZERO);
        };
        let key = hash_slot(slot);
        let Some(bytes) = self.storage.get(account.storage_root, &key.as_view()).await? else {
            return Ok(U256::ZERO);
        };
        Ok(alloy_rlp::Decodable::decode(&mut bytes.as_slice())?)
    }

    /// Reads code by its keccak hash.
    pub async fn read_code(&self, code_hash: Hash256) -> TriedbResult<Option<Code>> {
        if code_hash == alloy_consensus::constants::KECCAK_EMPTY {
            return Ok(Some(Code::new(Bytes::new())));
        }
        let key = NibbleView::new(code_hash.as_slice());
        let Some(bytes) = self.code.get(self.roots.read().code, &key).await? else {
            return Ok(None);
        };
        Ok(Some(Code::new(Bytes::from(bytes))))
    }

    /// Advances the Triedb by one block: applies every account/storage
    /// delta, stores new code, and recomputes all four header roots.
    /// Atomic from the caller's perspective — either every delta lands and
    /// the roots advance together, or an error is returned and nothing is
    /// persisted (no partial commit is visible through `state_root`, etc.,
    /// until this call returns successfully).
    pub async fn commit(&self, commit: BlockCommit) -> TriedbResult<Hash256> {
        let mut account_updates = Vec::with_capacity(commit.accounts.len());
        for delta in &commit.accounts {
            if delta.incarnation_bump {
                self.incarnations
                    .entry(delta.address)
                    .and_modify(|inc| *inc = inc.bump_tx())
                    .or_insert_with(Incarnation::default);
            }

            let Some(account) = &delta.account else {
                account_updates.push(Update::erase(hash_address(delta.address)));
                continue;
            };

            let old_storage_root = self
                .read_account_rlp(delta.address)
                .await?
                .map(|a| a.storage_root)
                .unwrap_or(Trie::<EthereumStateMachine>::empty_root());
            let base_storage_root = if delta.incarnation_bump { Trie::<EthereumStateMachine>::empty_root() } else { old_storage_root };

            let storage_writes: Vec<Update> = delta
                .storage
                .iter()
                .map(|(slot, value)| {
                    let mut buf = Vec::new();
                    alloy_rlp::Encodable::encode(value, &mut buf);
                    Update::write(hash_slot(*slot), buf)
                })
                .collect();
            let new_storage_root = if storage_writes.is_empty() {
                base_storage_root
            } else {
                self.storage.upsert(base_storage_root, &storage_writes).await?
            };

            let rlp = AccountRlp::new(account, new_storage_root);
            account_updates.push(Update::write(hash_address(delta.address), rlp.encode_account()));
        }

        let new_state_root = if account_updates.is_empty() {
            self.state_root()
        } else {
            self.accounts.upsert(self.state_root(), &account_updates).await?
        };

        let code_updates: Vec<Update> = commit
            .code
            .iter()
            .map(|code| Update::write(NodePath::from_view(&NibbleView::new(code.hash().as_slice())), code.bytes().to_vec()))
            .collect();
        let new_code_root = if code_updates.is_empty() {
            self.roots.read().code
        } else {
            self.code.upsert(self.roots.read().code, &code_updates).await?
        };

        let receipts_root = ordered_trie_root(&commit.receipts, |r, buf| buf.put_slice(r));
        let transactions_root = ordered_trie_root(&commit.transactions, |t, buf| buf.put_slice(t));
        let withdrawals_root = ordered_trie_root(&commit.withdrawals, |w, buf| buf.put_slice(w));

        {
            let mut roots = self.roots.write();
            roots.state = new_state_root;
            roots.code = new_code_root;
            roots.receipts = receipts_root;
            roots.transactions = transactions_root;
            roots.withdrawals = withdrawals_root;
        }
        self.block_number.store(commit.block_number, Ordering::Release);

        info!(
            target: "ferrochain_triedb",
            block_number = commit.block_number,
            %new_state_root,
            tx_count = commit.transactions.len(),
            "committed block",
        );

        Ok(new_state_root)
    }

    /// Records the block number and consensus round the Triedb is currently
    /// tracking, ahead of a `commit` for that block. Used by the driver to
    /// keep the Triedb's notion of "current" in step with the fork-aware
    /// block hash ring.
    pub fn set_block_and_round(&self, block_number: u64, round: Option<u64>) {
        self.block_number.store(block_number, Ordering::Release);
        *self.round.write() = round;
    }

    /// Marks `block_number` (and its round, if consensus tracks one) as
    /// finalized: no longer subject to a fork switch.
    pub fn finalize(&self, block_number: u64, round: Option<u64>) {
        self.finalized_block.store(block_number, Ordering::Release);
        *self.round.write() = round;
    }

    /// Marks `block_number` as the most recent block whose state root has
    /// been independently verified (e.g. against a second, re-executing
    /// node), without necessarily being finalized by consensus yet.
    pub fn update_verified_block(&self, block_number: u64) {
        self.verified_block.store(block_number, Ordering::Release);
    }

    /// The block number most recently passed to [`Self::commit`] or
    /// [`Self::set_block_and_round`].
    pub fn current_block(&self) -> u64 {
        self.block_number.load(Ordering::Acquire)
    }

    /// The block number most recently passed to [`Self::finalize`].
    pub fn finalized_block(&self) -> u64 {
        self.finalized_block.load(Ordering::Acquire)
    }

    /// The block number most recently passed to [`Self::update_verified_block`].
    pub fn verified_block(&self) -> u64 {
        self.verified_block.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Triedb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Triedb")
            .field("block_number", &self.current_block())
            .field("state_root", &self.state_root())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrochain_storage_pool::StorageConfig;
    use tempfile::tempdir;

    fn test_db() -> (tempfile::TempDir, Triedb) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pool.dat");
        let config =
            StorageConfig { file_paths: vec![path], chunk_size: 4096, chunks_per_file: 64, page_size: 4096, hugepages: false };
        let pool = Arc::new(StoragePool::open(config).unwrap());
        let ring = IoRing::new(pool.clone(), Default::default());
        (dir, Triedb::new(ring, pool, TriedbConfig::default()))
    }

    #[tokio::test]
    async fn unknown_account_reads_as_none() {
        let (_dir, db) = test_db();
        let addr = Address::repeat_byte(0x11);
        assert_eq!(db.read_account(addr).await.unwrap(), None);
    }

    #[tokio::test]
    async fn commit_makes_an_account_readable_at_the_new_root() {
        let (_dir, db) = test_db();
        let addr = Address::repeat_byte(0x22);
        let account = Account { balance: U256::from(1_000u64), nonce: 3, ..Default::default() };

        let delta = AccountDelta { address: addr, account: Some(account), storage: Vec::new(), incarnation_bump: false };
        let commit = BlockCommit { block_number: 1, accounts: vec![delta], ..Default::default() };
        let root = db.commit(commit).await.unwrap();

        assert_eq!(root, db.state_root());
        let read_back = db.read_account(addr).await.unwrap().unwrap();
        assert_eq!(read_back.balance, U256::from(1_000u64));
        assert_eq!(read_back.nonce, 3);
    }

    #[tokio::test]
    async fn storage_writes_are_readable_under_the_matching_incarnation() {
        let (_dir, db) = test_db();
        let addr = Address::repeat_byte(0x33);
        let account = Account { balance: U256::from(1u64), ..Default::default() };
        let slot = U256::from(7u64);
        let value = U256::from(42u64);

        let delta =
            AccountDelta { address: addr, account: Some(account), storage: vec![(slot, value)], incarnation_bump: false };
        let commit = BlockCommit { block_number: 1, accounts: vec![delta], ..Default::default() };
        db.commit(commit).await.unwrap();

        let incarnation = Incarnation::default();
        assert_eq!(db.read_storage(addr, incarnation, slot).await.unwrap(), value);
    }

    #[tokio::test]
    async fn stale_incarnation_reads_storage_as_zero() {
        let (_dir, db) = test_db();
        let addr = Address::repeat_byte(0x44);
        let account = Account { balance: U256::from(1u64), ..Default::default() };
        let slot = U256::from(7u64);
        let value = U256::from(42u64);

        let delta =
            AccountDelta { address: addr, account: Some(account), storage: vec![(slot, value)], incarnation_bump: true };
        let commit = BlockCommit { block_number: 1, accounts: vec![delta], ..Default::default() };
        db.commit(commit).await.unwrap();

        let stale = Incarnation::default();
        assert_eq!(db.read_storage(addr, stale, slot).await.unwrap(), U256::ZERO);
    }

    #[tokio::test]
    async fn erasing_an_account_removes_it_from_the_next_root() {
        let (_dir, db) = test_db();
        let addr = Address::repeat_byte(0x55);
        let account = Account { balance: U256::from(1u64), ..Default::default() };

        let create = AccountDelta { address: addr, account: Some(account), storage: Vec::new(), incarnation_bump: false };
        db.commit(BlockCommit { block_number: 1, accounts: vec![create], ..Default::default() }).await.unwrap();
        assert!(db.read_account(addr).await.unwrap().is_some());

        let erase = AccountDelta { address: addr, account: None, storage: Vec::new(), incarnation_bump: false };
        db.commit(BlockCommit { block_number: 2, accounts: vec![erase], ..Default::default() }).await.unwrap();
        assert_eq!(db.read_account(addr).await.unwrap(), None);
    }

    #[tokio::test]
    async fn code_round_trips_by_its_own_hash() {
        let (_dir, db) = test_db();
        let code = Code::new(Bytes::from_static(b"\x60\x00\x60\x00\xf3"));

        db.commit(BlockCommit { block_number: 1, code: vec![code.clone()], ..Default::default() }).await.unwrap();

        let read_back = db.read_code(code.hash()).await.unwrap().unwrap();
        assert_eq!(read_back.bytes(), code.bytes());
    }

    #[tokio::test]
    async fn empty_code_hash_resolves_without_a_trie_lookup() {
        let (_dir, db) = test_db();
        let empty = db.read_code(alloy_consensus::constants::KECCAK_EMPTY).await.unwrap().unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn committing_receipts_advances_the_receipts_root() {
        let (_dir, db) = test_db();
        assert_eq!(db.receipts_root(), alloy_consensus::EMPTY_ROOT_HASH);

        let commit = BlockCommit { block_number: 1, receipts: vec![Bytes::from_static(b"receipt-one")], ..Default::default() };
        db.commit(commit).await.unwrap();
        assert_ne!(db.receipts_root(), alloy_consensus::EMPTY_ROOT_HASH);
    }
}
