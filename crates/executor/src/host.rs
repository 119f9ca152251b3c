//! The EVM host interface (spec. §6 "EVM host callbacks"), backed by a
//! per-transaction [`VersionStack`] journal over [`BlockState`].
//!
//! Every address or slot a transaction touches gets its own
//! [`VersionStack`], lazily seeded from [`BlockState`] on first touch and
//! copy-on-write across the call frames that [`TxHost::push_checkpoint`]
//! and [`TxHost::accept`]/[`TxHost::reject`] delimit. [`TxHost::finish`]
//! folds the whole journal into the [`TxStateChanges`] shape
//! `ferrochain-block-state` merges against the rest of the block.

use async_trait::async_trait;
use alloy_primitives::Log;
use ferrochain_block_hash::BlockHashBuffer;
use ferrochain_block_state::{AccountChange, BlockState, BlockStateResult, StorageChange, TxStateChanges};
use ferrochain_primitives::{Account, Address, Code, Hash256, Incarnation, Revision, U256};
use ferrochain_tx_state::{AccessStatus, CheckpointCounter, CheckpointId, Substate, VersionStack};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

/// The block-scoped and transaction-scoped facts the EVM needs outside of
/// account/storage state: `get_tx_context`/`get_block_hash`.
#[derive(Debug, Clone)]
pub struct TxContext {
    /// The transaction's recovered sender (`ORIGIN`).
    pub origin: Address,
    /// The effective gas price paid by this transaction.
    pub gas_price: U256,
    /// The block's beneficiary (`COINBASE`).
    pub coinbase: Address,
    /// The current block number.
    pub block_number: u64,
    /// The current block timestamp.
    pub block_timestamp: u64,
    /// The current block's base fee, if the revision has one.
    pub base_fee: U256,
    /// The active EVM revision.
    pub revision: Revision,
}

/// The EVM host callback set (spec. §6), implemented against a
/// transaction's journaled state. One call per opcode that needs chain
/// state; a pluggable `EvmEngine` drives these as it interprets bytecode.
#[async_trait]
pub trait EvmHost: Send {
    /// `EXTCODESIZE`/`BALANCE`-adjacent: whether `address` currently exists
    /// (has been touched as non-empty, or has a non-default entry).
    async fn account_exists(&mut self, address: Address) -> BlockStateResult<bool>;
    /// `BALANCE`.
    async fn get_balance(&mut self, address: Address) -> BlockStateResult<U256>;
    /// `EXTCODESIZE`.
    async fn get_code_size(&mut self, address: Address) -> BlockStateResult<usize>;
    /// `EXTCODEHASH`.
    async fn get_code_hash(&mut self, address: Address) -> BlockStateResult<Hash256>;
    /// `EXTCODECOPY`.
    async fn copy_code(&mut self, address: Address) -> BlockStateResult<Option<Code>>;
    /// `SLOAD`.
    async fn get_storage(&mut self, address: Address, slot: U256) -> BlockStateResult<U256>;
    /// `SSTORE`.
    async fn set_storage(&mut self, address: Address, slot: U256, value: U256) -> BlockStateResult<()>;
    /// `TLOAD` (EIP-1153). Never read through to Block State: transient
    /// storage is cleared at the end of every transaction.
    fn get_transient_storage(&mut self, address: Address, slot: U256) -> U256;
    /// `TSTORE` (EIP-1153).
    fn set_transient_storage(&mut self, address: Address, slot: U256, value: U256);
    /// `SELFDESTRUCT`, crediting `address`'s balance to `beneficiary`.
    async fn selfdestruct(&mut self, address: Address, beneficiary: Address) -> BlockStateResult<()>;
    /// The value-transfer half of `CALL`/`CREATE` (spec. host callback
    /// `call`): debits `value` from `from` and credits it to `to`, failing
    /// without changing either balance if `from` can't afford it. Nested
    /// bytecode dispatch itself is the engine's own responsibility — engine
    /// and host share one process, so a nested call recurses directly into
    /// the engine rather than crossing back out through the host the way a
    /// foreign-ABI EVM implementation would.
    async fn transfer_value(&mut self, from: Address, to: Address, value: U256) -> BlockStateResult<bool>;
    /// `TXN`/env opcodes reading the ambient transaction/block context.
    fn get_tx_context(&self) -> &TxContext;
    /// `BLOCKHASH`.
    fn get_block_hash(&self, block_number: u64) -> Hash256;
    /// `LOG0`-`LOG4`.
    fn emit_log(&mut self, log: Log);
    /// EIP-2929: records `address` as accessed, returning whether this is
    /// the first access this transaction.
    fn access_account(&mut self, address: Address) -> AccessStatus;
    /// EIP-2929: records `(address, slot)` as accessed.
    fn access_storage(&mut self, address: Address, slot: U256) -> AccessStatus;
}

/// Per-address bookkeeping a [`TxHost`] keeps alongside its versioned
/// account/storage journal.
#[derive(Default)]
struct AddressState {
    account: Option<VersionStack<Option<Account>>>,
    substate: Substate,
}

/// The concrete [`EvmHost`] every transaction executes against: a
/// checkpointed journal over one block's [`BlockState`].
pub struct TxHost {
    block_state: Arc<BlockState>,
    block_hashes: Arc<dyn BlockHashBuffer + Send + Sync>,
    context: TxContext,
    checkpoints: CheckpointCounter,
    current_checkpoint: CheckpointId,
    addresses: HashMap<Address, AddressState>,
    storage: HashMap<(Address, U256), VersionStack<U256>>,
    transient: HashMap<(Address, U256), U256>,
    code: HashMap<Hash256, Code>,
    logs: Vec<Log>,
    created_this_tx: HashSet<Address>,
    destructed_this_tx: HashSet<Address>,
}

impl TxHost {
    /// Starts a fresh journal for one transaction against `block_state`,
    /// reading `BLOCKHASH` through `block_hashes`.
    pub fn new(block_state: Arc<BlockState>, block_hashes: Arc<dyn BlockHashBuffer + Send + Sync>, context: TxContext) -> Self {
        Self {
            block_state,
            block_hashes,
            context,
            checkpoints: CheckpointCounter::new(),
            current_checkpoint: 0,
            addresses: HashMap::new(),
            storage: HashMap::new(),
            transient: HashMap::new(),
            code: HashMap::new(),
            logs: Vec::new(),
            created_this_tx: HashSet::new(),
            destructed_this_tx: HashSet::new(),
        }
    }

    /// Pushes a new call/create frame checkpoint (spec. "call/create frames
    /// push a checkpoint").
    pub fn push_checkpoint(&mut self) -> CheckpointId {
        self.current_checkpoint = self.checkpoints.push();
        self.current_checkpoint
    }

    /// Accepts `checkpoint`: the frame succeeded, so its writes fold into
    /// the parent frame.
    pub fn accept(&mut self, checkpoint: CheckpointId) {
        for state in self.addresses.values_mut() {
            if let Some(stack) = &mut state.account {
                stack.accept(checkpoint);
            }
        }
        for stack in self.storage.values_mut() {
            stack.accept(checkpoint);
        }
    }

    /// Rejects `checkpoint` (`EVMC_REVERT`/`EVMC_FAILURE`): the frame's
    /// writes are discarded.
    pub fn reject(&mut self, checkpoint: CheckpointId) {
        for state in self.addresses.values_mut() {
            if let Some(stack) = &mut state.account {
                stack.reject(checkpoint);
            }
        }
        for stack in self.storage.values_mut() {
            stack.reject(checkpoint);
        }
    }

    /// Marks `address` as having been created by this transaction (a
    /// successful `CREATE`/`CREATE2`), used to decide EIP-6780
    /// same-tx-create self-destruct clearing in [`Self::finish`].
    pub fn mark_created(&mut self, address: Address) {
        self.created_this_tx.insert(address);
    }

    /// Credits `amount` to `address`'s balance, creating the account if it
    /// doesn't exist yet. Used by the pipeline for gas refunds, coinbase
    /// tips, and `CALL` value transfers that originate outside the EVM
    /// itself (minting, rather than moving value between two tracked
    /// accounts — see [`Self::debit_balance`] for the paired half of a
    /// transfer).
    pub async fn credit_balance(&mut self, address: Address, amount: U256) -> BlockStateResult<()> {
        let checkpoint = self.current_checkpoint;
        let stack = self.account_entry(address).await?;
        let target = stack.current(checkpoint);
        let mut account = target.unwrap_or_default();
        account.balance += amount;
        *target = Some(account);
        Ok(())
    }

    /// Debits `amount` from `address`'s balance. Callers are expected to
    /// have already checked sufficiency (the pipeline validates the
    /// sender's balance in [`crate::validation::stateful_validate`] before
    /// ever reaching this).
    pub async fn debit_balance(&mut self, address: Address, amount: U256) -> BlockStateResult<()> {
        let checkpoint = self.current_checkpoint;
        let stack = self.account_entry(address).await?;
        if let Some(account) = stack.current(checkpoint) {
            account.balance -= amount;
        }
        Ok(())
    }

    /// Increments `address`'s nonce by one (step 4: "increment the sender's
    /// nonce" before dispatch).
    pub async fn bump_nonce(&mut self, address: Address) -> BlockStateResult<()> {
        let checkpoint = self.current_checkpoint;
        let stack = self.account_entry(address).await?;
        let target = stack.current(checkpoint);
        let mut account = target.unwrap_or_default();
        account.nonce += 1;
        *target = Some(account);
        Ok(())
    }

    async fn account_entry(&mut self, address: Address) -> BlockStateResult<&mut VersionStack<Option<Account>>> {
        let state = self.addresses.entry(address).or_default();
        if state.account.is_none() {
            let base = self.block_state.read_account(address).await?;
            state.account = Some(VersionStack::new(base));
        }
        Ok(state.account.as_mut().expect("just seeded"))
    }

    async fn storage_entry(&mut self, address: Address, slot: U256) -> BlockStateResult<&mut VersionStack<U256>> {
        if !self.storage.contains_key(&(address, slot)) {
            let incarnation = self.incarnation_of(address);
            let base = self.block_state.read_storage(address, incarnation, slot).await?;
            self.storage.insert((address, slot), VersionStack::new(base));
        }
        Ok(self.storage.get_mut(&(address, slot)).expect("just seeded"))
    }

    fn incarnation_of(&self, address: Address) -> Incarnation {
        let base = self.block_state.current_incarnation(address);
        if self.destructed_this_tx.contains(&address) {
            base.bump_tx()
        } else {
            base
        }
    }

    /// Folds this transaction's entire journal into the shape
    /// [`ferrochain_block_state::BlockState::can_merge`]/`merge` consume.
    /// `revision` decides whether a self-destructed account is erased now
    /// (EIP-6780: only if also created this tx) or left for the caller to
    /// erase via a later, separate transaction's self-destruct semantics.
    pub fn finish(self, revision: Revision) -> TxStateChanges {
        let mut accounts = Vec::new();
        for (address, state) in self.addresses {
            let Some(mut stack) = state.account else { continue };
            let original = stack.peek(0).clone();
            let mut current = stack.current(self.current_checkpoint).clone();

            let incarnation_bump = self.destructed_this_tx.contains(&address);
            if incarnation_bump && (self.created_this_tx.contains(&address) || !revision.self_destruct_requires_same_tx_create()) {
                current = None;
            }

            accounts.push(AccountChange { address, original, current, incarnation_bump });
        }

        let storage = self
            .storage
            .into_iter()
            .map(|((address, slot), mut stack)| {
                let original = *stack.peek(0);
                let current = *stack.current(self.current_checkpoint);
                StorageChange { address, slot, original, current }
            })
            .collect();

        TxStateChanges { accounts, storage, code: self.code.into_values().collect() }
    }

    /// The logs this transaction emitted, in emission order.
    pub fn logs(&self) -> &[Log] {
        &self.logs
    }
}

#[async_trait]
impl EvmHost for TxHost {
    async fn account_exists(&mut self, address: Address) -> BlockStateResult<bool> {
        let checkpoint = self.current_checkpoint;
        let stack = self.account_entry(address).await?;
        Ok(stack.current(checkpoint).is_some())
    }

    async fn get_balance(&mut self, address: Address) -> BlockStateResult<U256> {
        let checkpoint = self.current_checkpoint;
        let stack = self.account_entry(address).await?;
        Ok(stack.current(checkpoint).map(|account| account.balance).unwrap_or_default())
    }

    async fn get_code_size(&mut self, address: Address) -> BlockStateResult<usize> {
        Ok(self.copy_code(address).await?.map(|code| code.len()).unwrap_or_default())
    }

    async fn get_code_hash(&mut self, address: Address) -> BlockStateResult<Hash256> {
        let checkpoint = self.current_checkpoint;
        let stack = self.account_entry(address).await?;
        Ok(stack.current(checkpoint).map(|account| account.code_hash).unwrap_or_default())
    }

    async fn copy_code(&mut self, address: Address) -> BlockStateResult<Option<Code>> {
        let checkpoint = self.current_checkpoint;
        let hash = self.account_entry(address).await?.current(checkpoint).map(|account| account.code_hash);
        let Some(hash) = hash else { return Ok(None) };
        if let Some(code) = self.code.get(&hash) {
            return Ok(Some(code.clone()));
        }
        let code = self.block_state.read_code(hash).await?;
        if let Some(code) = &code {
            self.code.insert(hash, code.clone());
        }
        Ok(code)
    }

    async fn get_storage(&mut self, address: Address, slot: U256) -> BlockStateResult<U256> {
        let checkpoint = self.current_checkpoint;
        Ok(*self.storage_entry(address, slot).await?.current(checkpoint))
    }

    async fn set_storage(&mut self, address: Address, slot: U256, value: U256) -> BlockStateResult<()> {
        let checkpoint = self.current_checkpoint;
        *self.storage_entry(address, slot).await?.current(checkpoint) = value;
        Ok(())
    }

    fn get_transient_storage(&mut self, address: Address, slot: U256) -> U256 {
        self.transient.get(&(address, slot)).copied().unwrap_or_default()
    }

    fn set_transient_storage(&mut self, address: Address, slot: U256, value: U256) {
        self.transient.insert((address, slot), value);
    }

    async fn selfdestruct(&mut self, address: Address, beneficiary: Address) -> BlockStateResult<()> {
        let checkpoint = self.current_checkpoint;
        let balance = self.account_entry(address).await?.current(checkpoint).map(|account| account.balance).unwrap_or_default();

        if beneficiary != address {
            let beneficiary_stack = self.account_entry(beneficiary).await?;
            let target = beneficiary_stack.current(checkpoint);
            let mut account = target.unwrap_or_default();
            account.balance += balance;
            *target = Some(account);
        }

        let own_stack = self.account_entry(address).await?;
        if let Some(account) = own_stack.current(checkpoint) {
            account.balance = U256::ZERO;
        }
        self.destructed_this_tx.insert(address);
        Ok(())
    }

    async fn transfer_value(&mut self, from: Address, to: Address, value: U256) -> BlockStateResult<bool> {
        if value.is_zero() {
            return Ok(true);
        }
        let checkpoint = self.current_checkpoint;
        let sender_balance = self.account_entry(from).await?.current(checkpoint).map(|account| account.balance).unwrap_or_default();
        if sender_balance < value {
            return Ok(false);
        }

        if let Some(account) = self.account_entry(from).await?.current(checkpoint) {
            account.balance -= value;
        }
        let recipient_stack = self.account_entry(to).await?;
        let target = recipient_stack.current(checkpoint);
        let mut account = target.unwrap_or_default();
        account.balance += value;
        *target = Some(account);
        Ok(true)
    }

    fn get_tx_context(&self) -> &TxContext {
        &self.context
    }

    fn get_block_hash(&self, block_number: u64) -> Hash256 {
        self.block_hashes.get(block_number)
    }

    fn emit_log(&mut self, log: Log) {
        self.logs.push(log);
    }

    fn access_account(&mut self, address: Address) -> AccessStatus {
        self.addresses.entry(address).or_default().substate.access()
    }

    fn access_storage(&mut self, address: Address, slot: U256) -> AccessStatus {
        self.addresses.entry(address).or_default().substate.access_storage(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrochain_io_ring::IoRing;
    use ferrochain_storage_pool::{StorageConfig, StoragePool};
    use ferrochain_triedb::{Triedb, TriedbConfig};
    use tempfile::tempdir;

    fn test_host() -> (tempfile::TempDir, TxHost) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pool.dat");
        let config =
            StorageConfig { file_paths: vec![path], chunk_size: 4096, chunks_per_file: 64, page_size: 4096, hugepages: false };
        let pool = Arc::new(StoragePool::open(config).unwrap());
        let ring = IoRing::new(pool.clone(), Default::default());
        let triedb = Arc::new(Triedb::new(ring, pool, TriedbConfig::default()));
        let block_state = Arc::new(BlockState::new(triedb));
        let context = TxContext {
            origin: Address::repeat_byte(0x01),
            gas_price: U256::from(1u64),
            coinbase: Address::repeat_byte(0x02),
            block_number: 1,
            block_timestamp: 0,
            base_fee: U256::ZERO,
            revision: Revision::Cancun,
        };
        let block_hashes: Arc<dyn BlockHashBuffer + Send + Sync> = Arc::new(ferrochain_block_hash::BlockHashRing::new());
        (dir, TxHost::new(block_state, block_hashes, context))
    }

    #[tokio::test]
    async fn unknown_address_reads_as_absent() {
        let (_dir, mut host) = test_host();
        let addr = Address::repeat_byte(0x11);
        assert!(!host.account_exists(addr).await.unwrap());
        assert_eq!(host.get_balance(addr).await.unwrap(), U256::ZERO);
    }

    #[tokio::test]
    async fn storage_writes_are_visible_to_later_reads_in_the_same_frame() {
        let (_dir, mut host) = test_host();
        let addr = Address::repeat_byte(0x22);
        let slot = U256::from(7u64);
        host.set_storage(addr, slot, U256::from(42u64)).await.unwrap();
        assert_eq!(host.get_storage(addr, slot).await.unwrap(), U256::from(42u64));
    }

    #[tokio::test]
    async fn rejecting_a_checkpoint_discards_its_writes() {
        let (_dir, mut host) = test_host();
        let addr = Address::repeat_byte(0x33);
        let slot = U256::from(1u64);
        host.set_storage(addr, slot, U256::from(10u64)).await.unwrap();

        let checkpoint = host.push_checkpoint();
        host.set_storage(addr, slot, U256::from(99u64)).await.unwrap();
        assert_eq!(host.get_storage(addr, slot).await.unwrap(), U256::from(99u64));

        host.reject(checkpoint);
        host.current_checkpoint = 0;
        assert_eq!(host.get_storage(addr, slot).await.unwrap(), U256::from(10u64));
    }

    #[tokio::test]
    async fn access_account_is_cold_then_warm() {
        let (_dir, mut host) = test_host();
        let addr = Address::repeat_byte(0x44);
        assert_eq!(host.access_account(addr), AccessStatus::Cold);
        assert_eq!(host.access_account(addr), AccessStatus::Warm);
    }

    #[tokio::test]
    async fn finish_reports_a_created_account_with_no_prior_original() {
        let (_dir, mut host) = test_host();
        let addr = Address::repeat_byte(0x55);
        host.account_entry(addr).await.unwrap();
        {
            let stack = host.account_entry(addr).await.unwrap();
            *stack.current(0) = Some(Account { balance: U256::from(5u64), ..Default::default() });
        }
        let changes = host.finish(Revision::Cancun);
        assert_eq!(changes.accounts.len(), 1);
        assert_eq!(changes.accounts[0].original, None);
        assert_eq!(changes.accounts[0].current.unwrap().balance, U256::from(5u64));
    }
}
