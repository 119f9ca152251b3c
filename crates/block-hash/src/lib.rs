//! Last-256 block hash ring for the `BLOCKHASH` opcode, plus a
//! proposal/finalization overlay for speculative execution ahead of
//! consensus finality.
//!
//! [`BlockHashRing`] is the finalized ground truth; [`BlockHashProposal`]
//! layers one speculative block's hash on top of a parent buffer without
//! copying it, and [`BlockHashChain`] tracks the resulting fork tree across
//! consensus rounds, pruning abandoned branches as rounds finalize.

mod chain;
mod proposal;
mod ring;

pub use chain::BlockHashChain;
pub use proposal::BlockHashProposal;
pub use ring::{BlockHashBuffer, BlockHashRing};
