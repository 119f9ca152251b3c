//! The [`Account`] type as held by the execution and storage layers.

use crate::{Hash256, Incarnation, U256};
use alloy_consensus::constants::KECCAK_EMPTY;

/// An Ethereum account, as read through the Triedb facade.
///
/// This is the *logical* account used by the execution pipeline. The
/// consensus-encoded form stored in the trie (`{nonce, balance, storage_root,
/// code_hash}`) is a separate, narrower RLP structure produced by
/// `ferrochain-triedb`; [`Incarnation`] never crosses into the Merkle-hashed
/// bytes, it is local bookkeeping used to invalidate stale storage reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Account {
    /// The account's wei balance.
    pub balance: U256,
    /// Keccak256 hash of the account's code. Defaults to the keccak of the
    /// empty byte string for EOAs.
    pub code_hash: Hash256,
    /// The account's transaction nonce.
    pub nonce: u64,
    /// The account's current incarnation, bumped on self-destruct+recreate.
    pub incarnation: Incarnation,
}

impl Default for Account {
    fn default() -> Self {
        Self { balance: U256::ZERO, code_hash: KECCAK_EMPTY, nonce: 0, incarnation: Incarnation::default() }
    }
}

impl Account {
    /// Constructs a fresh account at the given incarnation, with zero balance
    /// and nonce and no code.
    pub fn new_empty(incarnation: Incarnation) -> Self {
        Self { incarnation, ..Default::default() }
    }

    /// An account is empty iff it has no code, no nonce and no balance
    /// (EIP-161).
    pub fn is_empty(&self) -> bool {
        self.code_hash == KECCAK_EMPTY && self.nonce == 0 && self.balance.is_zero()
    }

    /// An account is dead iff it is absent or [`Account::is_empty`].
    ///
    /// Absence is represented by the caller holding `Option<Account>`; this
    /// method only covers the "present but empty" half of the definition.
    pub fn is_dead(account: Option<&Self>) -> bool {
        account.map_or(true, Self::is_empty)
    }

    /// Whether this account has contract code associated with it.
    pub fn has_code(&self) -> bool {
        self.code_hash != KECCAK_EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_account_is_empty() {
        assert!(Account::default().is_empty());
    }

    #[test]
    fn nonzero_nonce_is_not_empty() {
        let account = Account { nonce: 1, ..Default::default() };
        assert!(!account.is_empty());
    }

    #[test]
    fn absent_account_is_dead() {
        assert!(Account::is_dead(None));
    }

    #[test]
    fn present_nonempty_account_is_not_dead() {
        let account = Account { balance: U256::from(1), ..Default::default() };
        assert!(!Account::is_dead(Some(&account)));
    }
}
