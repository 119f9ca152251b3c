//! The receipt a finished transaction reports (spec. step 8 "emit
//! receipt"): status, cumulative gas, and a logs bloom over its logs.

use alloy_primitives::{logs_bloom, Bloom, Log, LogData};

/// A transaction's execution receipt.
#[derive(Debug, Clone)]
pub struct Receipt {
    /// Whether execution succeeded (`EvmStatus::Success`) or not.
    pub success: bool,
    /// Gas used by this transaction alone.
    pub gas_used: u64,
    /// Gas used by this transaction plus every transaction before it in the
    /// block.
    pub cumulative_gas_used: u64,
    /// Logs emitted during execution. Empty if execution reverted or
    /// failed.
    pub logs: Vec<Log>,
    /// Bloom filter over `logs`' addresses and topics.
    pub logs_bloom: Bloom,
}

impl Receipt {
    /// Builds a receipt from a finished transaction's outcome.
    pub fn new(success: bool, gas_used: u64, cumulative_gas_used: u64, logs: Vec<Log>) -> Self {
        let bloom = logs_bloom(&logs);
        Self { success, gas_used, cumulative_gas_used, logs, logs_bloom: bloom }
    }
}
