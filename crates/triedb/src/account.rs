//! [`AccountRlp`]: the consensus-encoded account form stored in the trie.
//!
//! This is the narrow four-field RLP structure Merkle-hashed into the state
//! trie, distinct from [`ferrochain_primitives::Account`], the logical
//! account shape the rest of the execution pipeline works with.
//! `incarnation` never crosses into this encoding — it is local bookkeeping
//! carried alongside the trie, not a consensus field.

use alloy_rlp::{RlpDecodable, RlpEncodable};
use alloy_primitives::{B256, U256};
use ferrochain_primitives::Account;

/// An Ethereum account as represented in the trie: `{nonce, balance,
/// storage_root, code_hash}`, encoded in that field order per the consensus
/// RLP layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, RlpEncodable, RlpDecodable)]
pub struct AccountRlp {
    /// Account nonce.
    pub nonce: u64,
    /// Account balance.
    pub balance: U256,
    /// Root of the account's storage trie.
    pub storage_root: B256,
    /// Hash of the account's bytecode.
    pub code_hash: B256,
}

impl AccountRlp {
    /// Builds the consensus encoding of `account`, pairing it with the
    /// account's current storage root.
    pub fn new(account: &Account, storage_root: B256) -> Self {
        Self { nonce: account.nonce, balance: account.balance, storage_root, code_hash: account.code_hash }
    }

    /// Recovers the logical account, dropping `storage_root` (trie-internal)
    /// and pairing with `incarnation` (trie-external bookkeeping).
    pub fn to_account(self, incarnation: ferrochain_primitives::Incarnation) -> Account {
        Account { balance: self.balance, code_hash: self.code_hash, nonce: self.nonce, incarnation }
    }

    /// RLP-encodes this account for storage as a trie leaf value.
    pub fn encode_account(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        alloy_rlp::Encodable::encode(self, &mut buf);
        buf
    }

    /// Decodes an account from the bytes stored at a trie leaf.
    pub fn decode_account(mut bytes: &[u8]) -> Result<Self, alloy_rlp::Error> {
        alloy_rlp::Decodable::decode(&mut bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_rlp::{Decodable, Encodable};

    #[test]
    fn round_trips_through_rlp() {
        let account = Account { balance: U256::from(42), nonce: 7, ..Default::default() };
        let rlp = AccountRlp::new(&account, B256::repeat_byte(0xAB));
        let mut buf = Vec::new();
        rlp.encode(&mut buf);
        let decoded = AccountRlp::decode(&mut buf.as_slice()).unwrap();
        assert_eq!(decoded, rlp);
    }
}
