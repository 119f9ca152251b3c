//! [`ExecutorConfig`]: the per-chain parameters the executor needs that
//! aren't carried by any one transaction or block.

use ferrochain_primitives::Revision;
use ferrochain_tx_state::GasSchedule;

/// Configuration for a [`crate::BlockExecutor`].
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// The chain id transactions must carry (post-EIP-155).
    pub chain_id: u64,
    /// The EVM revision active for the block being executed.
    pub revision: Revision,
    /// The storage gas schedule used for refund accounting.
    pub gas_schedule: GasSchedule,
    /// How many times a transaction may retry after a conflicting merge
    /// before it is marked failed.
    pub max_retries_per_tx: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { chain_id: 1, revision: Revision::Cancun, gas_schedule: GasSchedule::default(), max_retries_per_tx: 8 }
    }
}
