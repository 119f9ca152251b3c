//! The superset transaction shape the executor pipeline consumes: every
//! field any supported revision might need, gated by [`Revision`] at the
//! call site rather than by a family of per-type structs.

use alloy_primitives::{Address, Bytes, Signature, B256, U256};
use ferrochain_primitives::Revision;

/// One access-list entry: an address plus the storage keys the transaction
/// pre-declares it will touch (EIP-2930).
#[derive(Debug, Clone)]
pub struct AccessListEntry {
    /// The address being pre-warmed.
    pub address: Address,
    /// The storage slots on `address` being pre-warmed.
    pub storage_keys: Vec<B256>,
}

/// A transaction as the executor pipeline sees it, before sender recovery.
///
/// Fields introduced by a later revision (access lists, EIP-1559 fee
/// fields, blob fields) are always present but only consulted when
/// [`Revision`] enables them; this is the "superset model" the design
/// deliberately chose over a per-type transaction enum.
#[derive(Debug, Clone)]
pub struct TxInput {
    /// The chain id the transaction was signed for.
    pub chain_id: u64,
    /// The sender's account nonce as carried by the transaction.
    pub nonce: u64,
    /// The maximum gas this transaction may consume.
    pub gas_limit: u64,
    /// Legacy/EIP-2930 gas price, or the EIP-1559 max fee per gas.
    pub max_fee_per_gas: u128,
    /// EIP-1559 max priority fee per gas; equal to `max_fee_per_gas` for
    /// pre-1559 transactions.
    pub max_priority_fee_per_gas: u128,
    /// The call target, or `None` for a contract creation.
    pub to: Option<Address>,
    /// Wei transferred to `to` (or endowed to the new contract).
    pub value: U256,
    /// Calldata, or init code for a creation.
    pub data: Bytes,
    /// EIP-2930/EIP-1559/EIP-4844 access list.
    pub access_list: Vec<AccessListEntry>,
    /// EIP-4844 blob versioned hashes, if this is a blob transaction.
    pub blob_hashes: Vec<B256>,
    /// EIP-4844 max fee per blob gas.
    pub max_fee_per_blob_gas: u128,
    /// The transaction's signature over its signing hash.
    pub signature: Signature,
    /// The hash the signature was produced over.
    pub signing_hash: B256,
}

impl TxInput {
    /// Whether this transaction creates a contract.
    pub const fn is_create(&self) -> bool {
        self.to.is_none()
    }

    /// Whether this transaction carries EIP-4844 blobs.
    pub fn is_blob_transaction(&self) -> bool {
        !self.blob_hashes.is_empty()
    }

    /// Recovers the sender address from [`Self::signature`] over
    /// [`Self::signing_hash`].
    pub fn recover_sender(&self) -> Result<Address, alloy_primitives::SignatureError> {
        self.signature.recover_address_from_prehash(&self.signing_hash)
    }

    /// The total number of access-list storage keys across every entry.
    pub fn access_list_storage_keys(&self) -> usize {
        self.access_list.iter().map(|entry| entry.storage_keys.len()).sum()
    }

    /// The up-front cost this transaction reserves against the sender's
    /// balance: `max_fee_per_gas * gas_limit + value`, plus blob cost if
    /// applicable.
    pub fn upfront_cost(&self) -> U256 {
        let gas_cost = U256::from(self.max_fee_per_gas) * U256::from(self.gas_limit);
        let blob_cost = if self.is_blob_transaction() {
            U256::from(self.max_fee_per_blob_gas) * U256::from(self.blob_hashes.len() as u64 * BLOB_GAS_PER_BLOB)
        } else {
            U256::ZERO
        };
        gas_cost + self.value + blob_cost
    }
}

/// EIP-4844 gas charged per blob.
pub const BLOB_GAS_PER_BLOB: u64 = 131_072;

/// A transaction paired with its recovered sender, ready for validation and
/// execution.
#[derive(Debug, Clone)]
pub struct RecoveredTransaction {
    /// The transaction itself.
    pub tx: TxInput,
    /// The address that signed it.
    pub sender: Address,
}

impl RecoveredTransaction {
    /// Recovers `tx`'s sender and pairs them, matching spec step 1
    /// ("skip if pre-recovered" is the caller simply constructing this
    /// directly with an already-known sender instead of calling this).
    pub fn recover(tx: TxInput) -> Result<Self, alloy_primitives::SignatureError> {
        let sender = tx.recover_sender()?;
        Ok(Self { tx, sender })
    }

    /// Whether this transaction is gated by `revision` (blob/access-list
    /// fields present but the revision doesn't support them yet).
    pub fn enabled_at(&self, revision: Revision) -> bool {
        if self.tx.is_blob_transaction() && !revision.has_blob_transactions() {
            return false;
        }
        if !self.tx.access_list.is_empty() && !revision.has_access_lists() {
            return false;
        }
        true
    }
}
