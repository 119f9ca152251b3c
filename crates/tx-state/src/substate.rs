//! [`Substate`]: the EVM access-list and destruction bookkeeping tracked
//! per address within a transaction.

use ferrochain_primitives::U256;
use std::collections::HashSet;

/// Whether an access observed a location for the first time this
/// transaction (`Cold`, EIP-2929 surcharge applies) or had already touched
/// it (`Warm`, discounted cost).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessStatus {
    /// First access this transaction.
    Cold,
    /// Already accessed earlier this transaction.
    Warm,
}

/// Per-address bookkeeping outside the account's own balance/nonce/code:
/// self-destruction, whether it's been touched (and so is eligible for
/// state-clearing if left empty), and the EIP-2929 warm/cold access lists.
#[derive(Debug, Clone, Default)]
pub struct Substate {
    destructed: bool,
    touched: bool,
    accessed: bool,
    accessed_storage: HashSet<U256>,
}

impl Substate {
    /// Marks the address as self-destructed within this transaction.
    pub fn destruct(&mut self) {
        self.destructed = true;
    }

    /// Whether [`Self::destruct`] has been called.
    pub const fn is_destructed(&self) -> bool {
        self.destructed
    }

    /// Marks the address as touched (read, written, or the target/sender of
    /// a call), making it eligible for EIP-161 state-clearing if left
    /// empty at the end of the transaction.
    pub fn touch(&mut self) {
        self.touched = true;
    }

    /// Whether [`Self::touch`] has been called.
    pub const fn is_touched(&self) -> bool {
        self.touched
    }

    /// Records an access to the address itself, returning whether this is
    /// the first access this transaction.
    pub fn access(&mut self) -> AccessStatus {
        if self.accessed {
            AccessStatus::Warm
        } else {
            self.accessed = true;
            AccessStatus::Cold
        }
    }

    /// Records an access to one of the address's storage slots, returning
    /// whether this is the first access to `key` this transaction.
    pub fn access_storage(&mut self, key: U256) -> AccessStatus {
        if self.accessed_storage.insert(key) {
            AccessStatus::Cold
        } else {
            AccessStatus::Warm
        }
    }

    /// Whether `key` has already been accessed this transaction.
    pub fn is_storage_warm(&self, key: U256) -> bool {
        self.accessed_storage.contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_access_is_cold_then_warm() {
        let mut substate = Substate::default();
        assert_eq!(substate.access(), AccessStatus::Cold);
        assert_eq!(substate.access(), AccessStatus::Warm);
    }

    #[test]
    fn storage_access_tracks_per_slot() {
        let mut substate = Substate::default();
        let slot_a = U256::from(1);
        let slot_b = U256::from(2);
        assert_eq!(substate.access_storage(slot_a), AccessStatus::Cold);
        assert_eq!(substate.access_storage(slot_b), AccessStatus::Cold);
        assert_eq!(substate.access_storage(slot_a), AccessStatus::Warm);
        assert!(substate.is_storage_warm(slot_a));
        assert!(substate.is_storage_warm(slot_b));
    }

    #[test]
    fn destruct_and_touch_are_independent_flags() {
        let mut substate = Substate::default();
        assert!(!substate.is_destructed());
        assert!(!substate.is_touched());
        substate.touch();
        assert!(!substate.is_destructed());
        assert!(substate.is_touched());
        substate.destruct();
        assert!(substate.is_destructed());
    }
}
