//! The per-address entry [`BlockState`](crate::BlockState) holds, and the
//! shape a finished transaction reports its changes in.

use ferrochain_primitives::{Account, Address, Incarnation, U256};

/// One address's accumulated change within the block: the logical account
/// state and every storage slot written so far, each merged in from a
/// transaction in commit order.
#[derive(Debug, Clone, Default)]
pub struct StateDelta {
    /// The account's current logical state, or `None` if it doesn't exist
    /// (never created) or has been erased (self-destructed) by a merge so
    /// far this block.
    pub after: Option<Account>,
    /// The incarnation `after`'s storage slots were written under. Bumped
    /// whenever a merge recreates a previously self-destructed account.
    pub incarnation: Incarnation,
    /// Storage slots written by a merge so far this block, keyed by slot.
    pub storage: std::collections::HashMap<U256, U256>,
}

/// One address's account-level read/write summary from a finished
/// transaction: the value it observed when it first read the address
/// (`original`) and the value it leaves behind (`current`).
#[derive(Debug, Clone)]
pub struct AccountChange {
    /// The address this change applies to.
    pub address: Address,
    /// What the transaction read before making any change, used by
    /// [`crate::BlockState::can_merge`] to detect a conflicting merge by an
    /// intervening transaction.
    pub original: Option<Account>,
    /// The account's state at the end of the transaction.
    pub current: Option<Account>,
    /// Whether the account was self-destructed and recreated within this
    /// transaction, requiring its storage to be treated as wiped on merge.
    pub incarnation_bump: bool,
}

/// One storage slot's read/write summary from a finished transaction.
#[derive(Debug, Clone, Copy)]
pub struct StorageChange {
    /// The address the slot belongs to.
    pub address: Address,
    /// The slot being written.
    pub slot: U256,
    /// The value the transaction read before writing, used to detect a
    /// conflicting intervening merge.
    pub original: U256,
    /// The value the transaction leaves behind.
    pub current: U256,
}

/// A finished transaction's complete set of account and storage changes,
/// ready to validate against and merge into a [`crate::BlockState`].
#[derive(Debug, Clone, Default)]
pub struct TxStateChanges {
    /// Every address the transaction read or wrote.
    pub accounts: Vec<AccountChange>,
    /// Every storage slot the transaction read or wrote.
    pub storage: Vec<StorageChange>,
    /// Code the transaction deployed, keyed implicitly by its own hash.
    pub code: Vec<ferrochain_primitives::Code>,
}
