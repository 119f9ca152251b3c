//! The pluggable EVM engine seam: step 5 of the per-transaction pipeline
//! ("dispatch to the EVM") is owned by whatever implements [`EvmEngine`],
//! not by this crate. The engine only sees the [`EvmHost`] callback set; it
//! never touches [`ferrochain_block_state::BlockState`] directly.

use crate::host::{EvmHost, TxContext};
use alloy_primitives::{Bytes, Log};
use async_trait::async_trait;

/// How a call or contract creation concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvmStatus {
    /// Execution completed normally.
    Success,
    /// Execution hit `REVERT`: state changes are discarded, but gas spent
    /// up to that point is still charged.
    Revert,
    /// Execution failed for any other reason (out of gas, invalid opcode,
    /// stack over/underflow, static-call violation, and so on): state
    /// changes are discarded and no gas is refunded.
    Failure,
}

impl EvmStatus {
    /// Whether the call/create frame's writes should be kept.
    pub const fn succeeded(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// The result of running one transaction's top-level call or creation
/// through an [`EvmEngine`].
#[derive(Debug, Clone)]
pub struct EvmOutcome {
    /// How execution concluded.
    pub status: EvmStatus,
    /// Gas consumed by execution, excluding the intrinsic cost already
    /// charged before dispatch.
    pub gas_used: u64,
    /// The raw (uncapped) refund accumulated from `SSTORE` clears and
    /// `SELFDESTRUCT`s during execution.
    pub gas_refund: i64,
    /// Return data: the contract's return value for a call, or the
    /// deployed code for a creation.
    pub output: Bytes,
    /// Logs emitted during execution, in emission order. An engine that
    /// drives calls through [`EvmHost::emit_log`] copies this back from
    /// [`crate::host::TxHost::logs`] once execution concludes.
    pub logs: Vec<Log>,
}

/// A transaction's top-level call or creation, as the engine needs it.
/// Everything revision-gated has already been resolved by the pipeline;
/// the engine just runs bytecode against `host`.
#[derive(Debug, Clone)]
pub struct TxExecEnv {
    /// The transaction's sender.
    pub sender: alloy_primitives::Address,
    /// The call target, or `None` for a contract creation.
    pub to: Option<alloy_primitives::Address>,
    /// Wei transferred to `to` (or endowed to the new contract).
    pub value: alloy_primitives::U256,
    /// Calldata, or init code for a creation.
    pub data: Bytes,
    /// Gas available to execution after the intrinsic cost is deducted.
    pub gas_limit: u64,
}

/// The seam a bytecode interpreter plugs into: given a transaction's call
/// or creation and a state [`EvmHost`], run it to completion.
///
/// This crate ships no interpreter of its own — "the EVM" is treated as an
/// external, swappable engine, the same way the rest of the pipeline treats
/// storage and state merge as swappable behind their own traits.
#[async_trait]
pub trait EvmEngine: Send + Sync {
    /// Executes `env` against `host`, returning how it concluded.
    async fn execute(&self, env: &TxExecEnv, host: &mut dyn EvmHost) -> EvmOutcome;
}

/// A minimal engine covering value transfers only: no calldata execution,
/// no contract creation. Useful for exercising the pipeline's validation,
/// gas accounting, and state-merge plumbing without a real interpreter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueTransferEngine;

#[async_trait]
impl EvmEngine for ValueTransferEngine {
    async fn execute(&self, env: &TxExecEnv, host: &mut dyn EvmHost) -> EvmOutcome {
        if env.to.is_none() || !env.data.is_empty() {
            return EvmOutcome {
                status: EvmStatus::Failure,
                gas_used: env.gas_limit,
                gas_refund: 0,
                output: Bytes::new(),
                logs: Vec::new(),
            };
        }
        let to = env.to.expect("checked above");

        match host.transfer_value(env.sender, to, env.value).await {
            Ok(true) => {
                EvmOutcome { status: EvmStatus::Success, gas_used: 0, gas_refund: 0, output: Bytes::new(), logs: Vec::new() }
            }
            Ok(false) | Err(_) => EvmOutcome {
                status: EvmStatus::Failure,
                gas_used: env.gas_limit,
                gas_refund: 0,
                output: Bytes::new(),
                logs: Vec::new(),
            },
        }
    }
}

/// Re-exported so callers implementing custom engines don't need to depend
/// on the host module directly for the context type they'll read.
pub type EngineTxContext = TxContext;
