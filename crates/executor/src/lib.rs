//! Per-transaction EVM execution pipeline: validation, intrinsic gas,
//! dispatch to a pluggable [`engine::EvmEngine`] through the
//! [`host::EvmHost`] callback set, gas settlement, and the optimistic
//! conflict-retry loop that reconciles a transaction's merge against
//! whatever else has committed to [`ferrochain_block_state::BlockState`]
//! since it started.
//!
//! [`block::BlockExecutor`] drives a whole block's transactions in index
//! order; [`tx::execute_transaction_with_retry`] is the retry-capable unit
//! of work a caller wanting real speculative parallelism composes over a
//! [`ferrochain_fiber::FiberPool`] instead.

#[macro_use]
extern crate tracing;

mod block;
mod config;
mod engine;
mod errors;
mod gas;
mod host;
mod receipt;
mod tx;
mod tx_env;
mod validation;

pub use block::{BlockEnv, BlockExecutor};
pub use config::ExecutorConfig;
pub use engine::{EvmEngine, EvmOutcome, EvmStatus, TxExecEnv, ValueTransferEngine};
pub use errors::{ExecutorError, ExecutorResult, ValidationError};
pub use gas::{cap_refund, intrinsic_gas, IntrinsicGasInput};
pub use host::{EvmHost, TxContext, TxHost};
pub use receipt::Receipt;
pub use tx::{execute_transaction_with_retry, recover_if_needed};
pub use tx_env::{AccessListEntry, RecoveredTransaction, TxInput, BLOB_GAS_PER_BLOB};
pub use validation::{stateful_validate, static_validate};
