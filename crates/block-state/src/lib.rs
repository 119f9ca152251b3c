//! Per-block mutable state accumulator: the shared surface every
//! transaction's fiber reads from and, once it finishes, merges into.
//!
//! [`BlockState`] holds a concurrent map from address to [`StateDelta`],
//! populated lazily from [`ferrochain_triedb::Triedb`] on first read and
//! overwritten by [`BlockState::merge`] in transaction-commit order.
//! [`BlockState::can_merge`] implements the optimistic-concurrency check: a
//! transaction's merge only proceeds if nothing it read has changed since
//! it started executing.

mod block_state;
mod delta;
mod errors;

pub use block_state::BlockState;
pub use delta::{AccountChange, StateDelta, StorageChange, TxStateChanges};
pub use errors::{BlockStateError, BlockStateResult};
