//! Per-transaction checkpointed account/storage journal.
//!
//! A transaction's execution pushes a [`checkpoint::CheckpointId`] per call
//! or create frame from a shared [`checkpoint::CheckpointCounter`], and
//! tracks every address/slot it touches as a [`checkpoint::VersionStack`]
//! indexed by that id — copy-on-write, so untouched frames cost nothing.
//! [`substate::Substate`] rides alongside as the per-address bookkeeping
//! that isn't itself versioned value state: access-list warmth,
//! self-destruction, and whether the address has been touched. [`gas`]
//! classifies each `SSTORE` against EIP-2200's original/current/new triple
//! and derives its refund.

mod checkpoint;
mod gas;
mod substate;

pub use checkpoint::{CheckpointCounter, CheckpointId, VersionStack};
pub use gas::{refund_for, storage_status, GasSchedule, StorageStatus};
pub use substate::{AccessStatus, Substate};
