//! Steps 2-3 of the per-transaction pipeline: static validation (no state
//! access needed) and stateful validation (reads the sender account).

use crate::{
    errors::ValidationError,
    gas::{intrinsic_gas, IntrinsicGasInput},
    tx_env::{RecoveredTransaction, TxInput},
};
use alloy_primitives::U256;
use ferrochain_primitives::{Account, Revision};

/// EIP-3860 init-code size limit (Shanghai onward): twice the max
/// contract-code size.
const MAX_INIT_CODE_SIZE: usize = 2 * 24_576;

/// Step 2: validates everything about `tx` that doesn't require reading
/// chain state — chain id, type gating, fee field ordering, intrinsic gas,
/// and init-code size.
pub fn static_validate(tx: &TxInput, chain_id: u64, base_fee: u128, revision: Revision) -> Result<(), ValidationError> {
    if tx.chain_id != chain_id {
        return Err(ValidationError::WrongChainId { expected: chain_id, actual: tx.chain_id });
    }
    if tx.max_priority_fee_per_gas > tx.max_fee_per_gas {
        return Err(ValidationError::PriorityFeeExceedsMaxFee {
            priority: tx.max_priority_fee_per_gas,
            max: tx.max_fee_per_gas,
        });
    }
    if revision.has_base_fee() && tx.max_fee_per_gas < base_fee {
        return Err(ValidationError::MaxFeeBelowBaseFee { max_fee: tx.max_fee_per_gas, base_fee });
    }
    if tx.is_create() && revision.has_init_code_limit() && tx.data.len() > MAX_INIT_CODE_SIZE {
        return Err(ValidationError::InitCodeTooLarge { size: tx.data.len(), limit: MAX_INIT_CODE_SIZE });
    }
    if tx.is_blob_transaction() && !revision.has_blob_transactions() {
        return Err(ValidationError::TypeNotEnabled(3));
    }
    if !tx.access_list.is_empty() && !revision.has_access_lists() {
        return Err(ValidationError::TypeNotEnabled(1));
    }

    let intrinsic = intrinsic_gas(
        IntrinsicGasInput {
            data: &tx.data,
            is_create: tx.is_create(),
            access_list_addresses: tx.access_list.len(),
            access_list_storage_keys: tx.access_list_storage_keys(),
        },
        revision,
    );
    if intrinsic > tx.gas_limit {
        return Err(ValidationError::IntrinsicGasExceedsLimit { intrinsic, limit: tx.gas_limit });
    }

    Ok(())
}

/// Step 3: validates `tx` against the sender's current on-chain state —
/// nonce, balance, EOA-ness, and the block's remaining gas budget.
pub fn stateful_validate(
    recovered: &RecoveredTransaction,
    sender: Option<&Account>,
    cumulative_gas_used: u64,
    block_gas_limit: u64,
    revision: Revision,
) -> Result<(), ValidationError> {
    let account = sender.copied().unwrap_or_default();

    if account.nonce != recovered.tx.nonce {
        return Err(ValidationError::NonceMismatch { account: account.nonce, tx: recovered.tx.nonce });
    }

    let cost = recovered.tx.upfront_cost();
    if account.balance < cost {
        return Err(ValidationError::InsufficientBalance { balance: account.balance, cost });
    }

    if account.has_code() && !revision.allows_delegated_sender() {
        return Err(ValidationError::SenderNotEoa);
    }

    if cumulative_gas_used + recovered.tx.gas_limit > block_gas_limit {
        return Err(ValidationError::BlockGasLimitExceeded {
            used: cumulative_gas_used,
            tx_limit: recovered.tx.gas_limit,
            block_limit: block_gas_limit,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx_env::TxInput;
    use alloy_primitives::{Address, Bytes, Signature, B256};

    fn sample_tx() -> TxInput {
        TxInput {
            chain_id: 1,
            nonce: 0,
            gas_limit: 21_000,
            max_fee_per_gas: 10,
            max_priority_fee_per_gas: 1,
            to: Some(Address::repeat_byte(0x01)),
            value: U256::ZERO,
            data: Bytes::new(),
            access_list: Vec::new(),
            blob_hashes: Vec::new(),
            max_fee_per_blob_gas: 0,
            signature: Signature::test_signature(),
            signing_hash: B256::ZERO,
        }
    }

    #[test]
    fn rejects_wrong_chain_id() {
        let tx = sample_tx();
        let err = static_validate(&tx, 2, 0, Revision::Cancun).unwrap_err();
        assert!(matches!(err, ValidationError::WrongChainId { .. }));
    }

    #[test]
    fn rejects_priority_fee_above_max_fee() {
        let mut tx = sample_tx();
        tx.max_priority_fee_per_gas = 100;
        let err = static_validate(&tx, 1, 0, Revision::Cancun).unwrap_err();
        assert!(matches!(err, ValidationError::PriorityFeeExceedsMaxFee { .. }));
    }

    #[test]
    fn rejects_max_fee_below_base_fee_post_london() {
        let tx = sample_tx();
        let err = static_validate(&tx, 1, 100, Revision::London).unwrap_err();
        assert!(matches!(err, ValidationError::MaxFeeBelowBaseFee { .. }));
    }

    #[test]
    fn base_fee_check_is_skipped_pre_london() {
        let tx = sample_tx();
        assert!(static_validate(&tx, 1, 100, Revision::Berlin).is_ok());
    }

    #[test]
    fn rejects_gas_limit_below_intrinsic_gas() {
        let mut tx = sample_tx();
        tx.gas_limit = 100;
        let err = static_validate(&tx, 1, 0, Revision::Cancun).unwrap_err();
        assert!(matches!(err, ValidationError::IntrinsicGasExceedsLimit { .. }));
    }

    #[test]
    fn stateful_validate_rejects_nonce_mismatch() {
        let tx = sample_tx();
        let recovered = RecoveredTransaction { tx, sender: Address::repeat_byte(0x02) };
        let account = Account { nonce: 5, ..Default::default() };
        let err = stateful_validate(&recovered, Some(&account), 0, 30_000_000, Revision::Cancun).unwrap_err();
        assert!(matches!(err, ValidationError::NonceMismatch { .. }));
    }

    #[test]
    fn stateful_validate_rejects_insufficient_balance() {
        let tx = sample_tx();
        let recovered = RecoveredTransaction { tx, sender: Address::repeat_byte(0x02) };
        let account = Account { balance: U256::from(1u64), ..Default::default() };
        let err = stateful_validate(&recovered, Some(&account), 0, 30_000_000, Revision::Cancun).unwrap_err();
        assert!(matches!(err, ValidationError::InsufficientBalance { .. }));
    }

    #[test]
    fn stateful_validate_rejects_block_gas_limit_exceeded() {
        let tx = sample_tx();
        let recovered = RecoveredTransaction { tx, sender: Address::repeat_byte(0x02) };
        let account = Account { balance: U256::from(1_000_000u64), ..Default::default() };
        let err = stateful_validate(&recovered, Some(&account), 29_990_000, 30_000_000, Revision::Cancun).unwrap_err();
        assert!(matches!(err, ValidationError::BlockGasLimitExceeded { .. }));
    }

    #[test]
    fn stateful_validate_accepts_a_well_formed_transfer() {
        let tx = sample_tx();
        let recovered = RecoveredTransaction { tx, sender: Address::repeat_byte(0x02) };
        let account = Account { balance: U256::from(1_000_000u64), ..Default::default() };
        assert!(stateful_validate(&recovered, Some(&account), 0, 30_000_000, Revision::Cancun).is_ok());
    }
}
