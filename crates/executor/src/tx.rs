//! The per-transaction pipeline: recover (if needed), validate, charge
//! up-front gas, dispatch to the EVM, settle gas, and emit a receipt —
//! retrying against fresh state when an optimistic merge conflicts with an
//! earlier transaction's commit.

use crate::{
    config::ExecutorConfig,
    engine::{EvmEngine, EvmStatus, TxExecEnv},
    errors::{ExecutorError, ExecutorResult},
    gas::{cap_refund, intrinsic_gas, IntrinsicGasInput},
    host::{TxContext, TxHost},
    receipt::Receipt,
    tx_env::{RecoveredTransaction, TxInput},
    validation::{stateful_validate, static_validate},
};
use ferrochain_block_hash::BlockHashBuffer;
use ferrochain_block_state::BlockState;
use std::sync::Arc;

/// Runs one transaction against `block_state`, retrying on a conflicting
/// merge up to `config.max_retries_per_tx` times.
///
/// This is the fiber-compatible unit of work: it is safe to run many of
/// these concurrently (each against the same `block_state`, different
/// transactions) via `ferrochain_fiber::FiberPool::spawn`, since every
/// retry re-reads its inputs against the latest state before re-executing.
/// Commit order itself is whatever order the caller's merges land in; a
/// caller wanting transaction-index order serializes its merges in that
/// order (see [`crate::block::execute_block`]).
#[allow(clippy::too_many_arguments)]
pub async fn execute_transaction_with_retry(
    block_state: &Arc<BlockState>,
    block_hashes: &Arc<dyn BlockHashBuffer + Send + Sync>,
    engine: &dyn EvmEngine,
    recovered: &RecoveredTransaction,
    context: TxContext,
    cumulative_gas_used: u64,
    block_gas_limit: u64,
    config: &ExecutorConfig,
) -> ExecutorResult<Receipt> {
    static_validate(&recovered.tx, config.chain_id, context.base_fee.to::<u128>(), config.revision)?;

    let mut attempt = 0;
    loop {
        let sender_account = block_state.read_account(recovered.sender).await?;
        stateful_validate(recovered, sender_account.as_ref(), cumulative_gas_used, block_gas_limit, config.revision)?;

        let (receipt, changes) =
            run_once(block_state, block_hashes, engine, recovered, context.clone(), cumulative_gas_used, config).await?;

        if block_state.can_merge(&changes).await? {
            block_state.merge(changes);
            return Ok(receipt);
        }

        attempt += 1;
        if attempt >= config.max_retries_per_tx {
            return Err(ExecutorError::RetryBudgetExhausted { attempts: attempt });
        }
        ferrochain_fiber::yield_now().await;
    }
}

/// Runs the transaction exactly once against a fresh [`TxHost`] snapshot of
/// `block_state`, returning the receipt to report and the state changes to
/// attempt to merge.
#[allow(clippy::too_many_arguments)]
async fn run_once(
    block_state: &Arc<BlockState>,
    block_hashes: &Arc<dyn BlockHashBuffer + Send + Sync>,
    engine: &dyn EvmEngine,
    recovered: &RecoveredTransaction,
    context: TxContext,
    cumulative_gas_used: u64,
    config: &ExecutorConfig,
) -> ExecutorResult<(Receipt, ferrochain_block_state::TxStateChanges)> {
    let tx = &recovered.tx;
    let intrinsic = intrinsic_gas(
        IntrinsicGasInput {
            data: &tx.data,
            is_create: tx.is_create(),
            access_list_addresses: tx.access_list.len(),
            access_list_storage_keys: tx.access_list_storage_keys(),
        },
        config.revision,
    );

    let mut host = TxHost::new(Arc::clone(block_state), Arc::clone(block_hashes), context.clone());
    let checkpoint = host.push_checkpoint();

    // Charge the up-front cost (gas reserved at max_fee_per_gas, plus value)
    // and bump the nonce before dispatch, mirroring EIP-1559's "pay up
    // front, refund the unused portion" settlement.
    host.debit_balance(recovered.sender, tx.upfront_cost()).await?;
    host.bump_nonce(recovered.sender).await?;

    if config.revision.warms_coinbase() {
        host.access_account(context.coinbase);
    }
    host.access_account(recovered.sender);
    if let Some(to) = tx.to {
        host.access_account(to);
    }
    for entry in &tx.access_list {
        host.access_account(entry.address);
        for key in &entry.storage_keys {
            host.access_storage(entry.address, alloy_primitives::U256::from_be_bytes(key.0));
        }
    }

    let env = TxExecEnv {
        sender: recovered.sender,
        to: tx.to,
        value: tx.value,
        data: tx.data.clone(),
        gas_limit: tx.gas_limit.saturating_sub(intrinsic),
    };
    let outcome = engine.execute(&env, &mut host).await;

    if outcome.status.succeeded() {
        host.accept(checkpoint);
    } else {
        host.reject(checkpoint);
    }

    let gas_used = intrinsic + outcome.gas_used;
    let refund = cap_refund(gas_used, outcome.gas_refund, config.revision);
    let gas_remaining = tx.gas_limit.saturating_sub(gas_used) + refund;
    let fee_paid = (gas_used - refund).min(tx.gas_limit);

    host.credit_balance(recovered.sender, alloy_primitives::U256::from(tx.max_fee_per_gas) * alloy_primitives::U256::from(gas_remaining)).await?;
    let tip = effective_tip(tx.max_fee_per_gas, tx.max_priority_fee_per_gas, context.base_fee.to::<u128>());
    host.credit_balance(context.coinbase, alloy_primitives::U256::from(tip) * alloy_primitives::U256::from(fee_paid)).await?;

    let success = outcome.status.succeeded();
    let logs = if success { outcome.logs } else { Vec::new() };
    let receipt = Receipt::new(success, gas_used, cumulative_gas_used + gas_used, logs);

    Ok((receipt, host.finish(config.revision)))
}

fn effective_tip(max_fee_per_gas: u128, max_priority_fee_per_gas: u128, base_fee: u128) -> u128 {
    let headroom = max_fee_per_gas.saturating_sub(base_fee);
    max_priority_fee_per_gas.min(headroom)
}

/// Recovers a transaction's sender when the caller holds an un-recovered
/// [`TxInput`] (step 1, the "skip if pre-recovered" half of the pipeline).
pub fn recover_if_needed(tx: TxInput) -> Result<RecoveredTransaction, alloy_primitives::SignatureError> {
    RecoveredTransaction::recover(tx)
}
