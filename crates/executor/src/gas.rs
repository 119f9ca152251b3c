//! Intrinsic gas accounting (step 2/4) and refund capping (step 6) for the
//! per-transaction pipeline. Storage write refunds themselves are computed
//! by `ferrochain_tx_state::{storage_status, refund_for}`; this module only
//! covers the cost of the transaction envelope itself and the cap a
//! revision applies to whatever refund comes back from execution.

use ferrochain_primitives::Revision;

/// Gas charged per non-zero calldata byte (EIP-2028, Istanbul onward).
const NONZERO_CALLDATA_GAS: u64 = 16;
/// Gas charged per zero calldata byte.
const ZERO_CALLDATA_GAS: u64 = 4;
/// Base intrinsic gas for any transaction.
const BASE_TX_GAS: u64 = 21_000;
/// Additional intrinsic gas for a contract-creation transaction (EIP-2).
const CREATE_GAS: u64 = 32_000;
/// Gas per 32-byte word of init code charged at contract creation
/// (EIP-3860, Shanghai onward).
const INIT_CODE_WORD_GAS: u64 = 2;
/// Gas per access-list address entry (EIP-2930, Berlin onward).
const ACCESS_LIST_ADDRESS_GAS: u64 = 2_400;
/// Gas per access-list storage key entry (EIP-2930, Berlin onward).
const ACCESS_LIST_STORAGE_KEY_GAS: u64 = 1_900;

/// The inputs to an intrinsic gas calculation: just the parts of a
/// transaction the cost formula actually reads.
#[derive(Debug, Clone, Copy)]
pub struct IntrinsicGasInput<'a> {
    /// The transaction's calldata (or init code, for a creation).
    pub data: &'a [u8],
    /// Whether this transaction creates a contract (`to` is absent).
    pub is_create: bool,
    /// Number of distinct addresses in the transaction's access list.
    pub access_list_addresses: usize,
    /// Total number of storage keys across the access list.
    pub access_list_storage_keys: usize,
}

/// Computes the intrinsic gas cost of a transaction: the flat cost plus
/// calldata, access-list, and (post-Shanghai, for creations) init-code
/// word costs.
pub fn intrinsic_gas(input: IntrinsicGasInput<'_>, revision: Revision) -> u64 {
    let mut gas = BASE_TX_GAS;
    if input.is_create {
        gas += CREATE_GAS;
    }

    let zero_bytes = input.data.iter().filter(|b| **b == 0).count() as u64;
    let nonzero_bytes = input.data.len() as u64 - zero_bytes;
    gas += zero_bytes * ZERO_CALLDATA_GAS + nonzero_bytes * NONZERO_CALLDATA_GAS;

    if revision.has_access_lists() {
        gas += input.access_list_addresses as u64 * ACCESS_LIST_ADDRESS_GAS;
        gas += input.access_list_storage_keys as u64 * ACCESS_LIST_STORAGE_KEY_GAS;
    }

    if input.is_create && revision.has_init_code_limit() {
        let words = input.data.len().div_ceil(32) as u64;
        gas += words * INIT_CODE_WORD_GAS;
    }

    gas
}

/// Caps a raw refund accumulated during execution to the revision's limit:
/// uncapped pre-London, `gas_used / 5` from London onward (EIP-3529).
pub fn cap_refund(gas_used: u64, raw_refund: i64, revision: Revision) -> u64 {
    let refund = raw_refund.max(0) as u64;
    match revision.refund_cap_divisor() {
        Some(divisor) => refund.min(gas_used / divisor),
        None => refund,
    }
}
