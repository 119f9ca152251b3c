//! [`BlockExecutor`]: drives the per-transaction pipeline across a whole
//! block.
//!
//! This crate owns the per-transaction unit of work
//! ([`crate::tx::execute_transaction_with_retry`]) and a sequential
//! convenience driver ([`BlockExecutor::execute_block`]) that satisfies
//! "commits land in transaction-index order" by simply awaiting
//! transactions in that order against one shared [`BlockState`]. Genuine
//! speculative parallel execution — spawning many transactions as
//! concurrent fibers and letting [`ferrochain_fiber::FiberPool`]'s
//! conflict-retry loop reconcile whichever ones land first — is the
//! caller's to compose: spawn [`crate::tx::execute_transaction_with_retry`]
//! per transaction onto a pool and collect results back in index order.

use crate::{
    config::ExecutorConfig,
    engine::EvmEngine,
    errors::ExecutorResult,
    host::TxContext,
    receipt::Receipt,
    tx::execute_transaction_with_retry,
    tx_env::RecoveredTransaction,
};
use ferrochain_block_hash::BlockHashBuffer;
use ferrochain_block_state::BlockState;
use ferrochain_primitives::{Address, U256};
use std::sync::Arc;

/// Block-level facts every transaction in the block shares, beyond what
/// [`ExecutorConfig`] already pins per chain.
#[derive(Debug, Clone)]
pub struct BlockEnv {
    /// The block's beneficiary.
    pub coinbase: Address,
    /// The block number.
    pub number: u64,
    /// The block timestamp.
    pub timestamp: u64,
    /// The block's base fee (zero pre-London).
    pub base_fee: U256,
    /// The block's gas limit.
    pub gas_limit: u64,
}

/// Drives transactions against one block's [`BlockState`].
pub struct BlockExecutor {
    block_state: Arc<BlockState>,
    block_hashes: Arc<dyn BlockHashBuffer + Send + Sync>,
    config: ExecutorConfig,
    engine: Arc<dyn EvmEngine>,
}

impl BlockExecutor {
    /// Builds an executor for one block over `block_state`, reading
    /// `BLOCKHASH` through `block_hashes`.
    pub fn new(
        block_state: Arc<BlockState>,
        block_hashes: Arc<dyn BlockHashBuffer + Send + Sync>,
        config: ExecutorConfig,
        engine: Arc<dyn EvmEngine>,
    ) -> Self {
        Self { block_state, block_hashes, config, engine }
    }

    /// Executes every transaction in `transactions`, in order, against this
    /// block's state, returning each transaction's receipt. A transaction
    /// that fails validation or exhausts its retry budget short-circuits
    /// the block: the caller decides whether to drop it and continue or
    /// fail the whole block, so the index of the failing transaction is
    /// reported alongside the error.
    pub async fn execute_block(&self, env: &BlockEnv, transactions: &[RecoveredTransaction]) -> ExecutorResult<Vec<Receipt>> {
        info!(
            target: "executor",
            "executing block #{} | gas limit: {} | tx count: {}",
            env.number,
            env.gas_limit,
            transactions.len(),
        );

        let mut receipts = Vec::with_capacity(transactions.len());
        let mut cumulative_gas_used = 0u64;

        for (index, recovered) in transactions.iter().enumerate() {
            let context = TxContext {
                origin: recovered.sender,
                gas_price: U256::from(recovered.tx.max_fee_per_gas),
                coinbase: env.coinbase,
                block_number: env.number,
                block_timestamp: env.timestamp,
                base_fee: env.base_fee,
                revision: self.config.revision,
            };

            let receipt = execute_transaction_with_retry(
                &self.block_state,
                &self.block_hashes,
                self.engine.as_ref(),
                recovered,
                context,
                cumulative_gas_used,
                env.gas_limit,
                &self.config,
            )
            .await?;

            debug!(target: "executor", "transaction {} executed | gas used: {} | success: {}", index, receipt.gas_used, receipt.success);
            cumulative_gas_used = receipt.cumulative_gas_used;
            receipts.push(receipt);
        }

        Ok(receipts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ValueTransferEngine;
    use alloy_primitives::{Bytes, Signature, B256};
    use ferrochain_io_ring::IoRing;
    use ferrochain_primitives::Account;
    use ferrochain_storage_pool::{StorageConfig, StoragePool};
    use ferrochain_triedb::{Triedb, TriedbConfig};
    use tempfile::tempdir;

    async fn test_block_state() -> (tempfile::TempDir, Arc<BlockState>) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pool.dat");
        let config =
            StorageConfig { file_paths: vec![path], chunk_size: 4096, chunks_per_file: 64, page_size: 4096, hugepages: false };
        let pool = Arc::new(StoragePool::open(config).unwrap());
        let ring = IoRing::new(pool.clone(), Default::default());
        let triedb = Arc::new(Triedb::new(ring, pool, TriedbConfig::default()));
        (dir, Arc::new(BlockState::new(triedb)))
    }

    fn transfer(sender: Address, to: Address, nonce: u64, value: u64) -> RecoveredTransaction {
        RecoveredTransaction {
            tx: crate::tx_env::TxInput {
                chain_id: 1,
                nonce,
                gas_limit: 21_000,
                max_fee_per_gas: 1,
                max_priority_fee_per_gas: 1,
                to: Some(to),
                value: U256::from(value),
                data: Bytes::new(),
                access_list: Vec::new(),
                blob_hashes: Vec::new(),
                max_fee_per_blob_gas: 0,
                signature: Signature::test_signature(),
                signing_hash: B256::ZERO,
            },
            sender,
        }
    }

    #[tokio::test]
    async fn a_block_of_one_transfer_commits_and_pays_the_coinbase() {
        let (_dir, block_state) = test_block_state().await;
        let sender = Address::repeat_byte(0x01);
        let recipient = Address::repeat_byte(0x02);
        let coinbase = Address::repeat_byte(0x03);

        block_state.merge(ferrochain_block_state::TxStateChanges {
            accounts: vec![ferrochain_block_state::AccountChange {
                address: sender,
                original: None,
                current: Some(Account { balance: U256::from(1_000_000u64), ..Default::default() }),
                incarnation_bump: false,
            }],
            ..Default::default()
        });

        let block_hashes: Arc<dyn BlockHashBuffer + Send + Sync> = Arc::new(ferrochain_block_hash::BlockHashRing::new());
        let executor = BlockExecutor::new(block_state.clone(), block_hashes, ExecutorConfig::default(), Arc::new(ValueTransferEngine));
        let env = BlockEnv { coinbase, number: 1, timestamp: 0, base_fee: U256::ZERO, gas_limit: 30_000_000 };
        let txs = vec![transfer(sender, recipient, 0, 500)];

        let receipts = executor.execute_block(&env, &txs).await.unwrap();
        assert_eq!(receipts.len(), 1);
        assert!(receipts[0].success);

        let recipient_balance = block_state.read_account(recipient).await.unwrap().unwrap().balance;
        assert_eq!(recipient_balance, U256::from(500u64));
    }

    #[tokio::test]
    async fn a_second_transaction_sees_the_first_ones_nonce_bump() {
        let (_dir, block_state) = test_block_state().await;
        let sender = Address::repeat_byte(0x11);
        let recipient = Address::repeat_byte(0x12);

        block_state.merge(ferrochain_block_state::TxStateChanges {
            accounts: vec![ferrochain_block_state::AccountChange {
                address: sender,
                original: None,
                current: Some(Account { balance: U256::from(1_000_000u64), ..Default::default() }),
                incarnation_bump: false,
            }],
            ..Default::default()
        });

        let block_hashes: Arc<dyn BlockHashBuffer + Send + Sync> = Arc::new(ferrochain_block_hash::BlockHashRing::new());
        let executor = BlockExecutor::new(block_state.clone(), block_hashes, ExecutorConfig::default(), Arc::new(ValueTransferEngine));
        let env = BlockEnv { coinbase: Address::repeat_byte(0x99), number: 1, timestamp: 0, base_fee: U256::ZERO, gas_limit: 30_000_000 };
        let txs = vec![transfer(sender, recipient, 0, 100), transfer(sender, recipient, 1, 100)];

        let receipts = executor.execute_block(&env, &txs).await.unwrap();
        assert!(receipts.iter().all(|r| r.success));

        let sender_account = block_state.read_account(sender).await.unwrap().unwrap();
        assert_eq!(sender_account.nonce, 2);
    }
}
