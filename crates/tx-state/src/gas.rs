//! EIP-2200/3529 storage-write classification and refund accounting.
//!
//! [`storage_status`] classifies an `SSTORE` by its original (pre-block),
//! current (pre-this-write, possibly already dirtied earlier in the same
//! transaction) and new value, mirroring the zero/nonzero transition table
//! evmone's account state journal tracks per slot.

use ferrochain_primitives::U256;

/// The nine `(original, current, new)` transitions an `SSTORE` can make.
/// `Unchanged` (current == new) costs only the warm/cold access surcharge;
/// every other variant additionally selects a refund per [`refund_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageStatus {
    /// `new == current`: a no-op write.
    Unchanged,
    /// `0 -> 0 -> z`: a fresh nonzero value.
    Added,
    /// `x -> x -> 0`: clearing an untouched nonzero slot.
    Deleted,
    /// `x -> x -> z`: overwriting an untouched nonzero slot with another
    /// nonzero value.
    Modified,
    /// `x -> 0 -> z`: re-adding a value to a slot this transaction already
    /// cleared.
    DeletedAdded,
    /// `x -> y -> 0`: clearing a slot this transaction already modified.
    ModifiedDeleted,
    /// `x -> 0 -> x`: restoring a slot this transaction cleared back to its
    /// original nonzero value.
    DeletedRestored,
    /// `0 -> z -> 0`: clearing a slot this transaction added from zero.
    AddedDeleted,
    /// `x -> y -> x`: restoring a slot this transaction modified back to
    /// its original nonzero value.
    ModifiedRestored,
}

/// Classifies an `SSTORE` given the slot's value before the block
/// (`original`), before this write but possibly already dirtied earlier
/// this transaction (`current`), and the value being written (`new`).
pub fn storage_status(original: U256, current: U256, new: U256) -> StorageStatus {
    if current == new {
        return StorageStatus::Unchanged;
    }
    if original == current {
        return if original.is_zero() {
            StorageStatus::Added
        } else if new.is_zero() {
            StorageStatus::Deleted
        } else {
            StorageStatus::Modified
        };
    }
    if new == original {
        return if original.is_zero() {
            StorageStatus::AddedDeleted
        } else if current.is_zero() {
            StorageStatus::DeletedRestored
        } else {
            StorageStatus::ModifiedRestored
        };
    }
    if current.is_zero() {
        StorageStatus::DeletedAdded
    } else if new.is_zero() {
        StorageStatus::ModifiedDeleted
    } else {
        StorageStatus::Modified
    }
}

/// The gas costs and refund a revision assigns to `SSTORE`/cold-access.
/// Defaults to the post-EIP-3529 (London-onward) schedule; traits above
/// this crate gate which schedule applies per [`ferrochain_primitives::Revision`].
#[derive(Debug, Clone, Copy)]
pub struct GasSchedule {
    /// Cost of a cold storage slot access (EIP-2929).
    pub cold_sload: u64,
    /// Cost of a warm storage slot access.
    pub warm_storage_read: u64,
    /// Cost of writing a zero slot to a nonzero value.
    pub sstore_set: u64,
    /// Cost of writing a nonzero slot to a different value.
    pub sstore_reset: u64,
    /// Refund for clearing a nonzero slot to zero (EIP-3529 reduced this
    /// from 15000 pre-London to 4800).
    pub sstore_clears_refund: i64,
}

impl Default for GasSchedule {
    fn default() -> Self {
        Self { cold_sload: 2_100, warm_storage_read: 100, sstore_set: 20_000, sstore_reset: 2_900, sstore_clears_refund: 4_800 }
    }
}

/// The gas refund `status` earns under `schedule`, following the
/// original-vs-current-vs-new triple: clearing a nonzero original value
/// refunds, and restoring a slot to its original value within the same
/// transaction refunds or un-refunds depending on which direction the
/// restoration crosses.
pub fn refund_for(status: StorageStatus, schedule: &GasSchedule) -> i64 {
    match status {
        StorageStatus::Unchanged | StorageStatus::Added | StorageStatus::Modified | StorageStatus::DeletedAdded => 0,
        StorageStatus::Deleted | StorageStatus::ModifiedDeleted => schedule.sstore_clears_refund,
        StorageStatus::AddedDeleted => schedule.sstore_set as i64 - schedule.warm_storage_read as i64,
        StorageStatus::DeletedRestored => -schedule.sstore_clears_refund + (schedule.sstore_reset as i64 - schedule.warm_storage_read as i64),
        StorageStatus::ModifiedRestored => schedule.sstore_reset as i64 - schedule.warm_storage_read as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(n: u64) -> U256 {
        U256::from(n)
    }

    #[test]
    fn classifies_unchanged_writes() {
        assert_eq!(storage_status(u(5), u(5), u(5)), StorageStatus::Unchanged);
    }

    #[test]
    fn classifies_fresh_add_and_delete() {
        assert_eq!(storage_status(u(0), u(0), u(7)), StorageStatus::Added);
        assert_eq!(storage_status(u(7), u(7), u(0)), StorageStatus::Deleted);
        assert_eq!(storage_status(u(7), u(7), u(9)), StorageStatus::Modified);
    }

    #[test]
    fn classifies_same_transaction_re_touches() {
        assert_eq!(storage_status(u(7), u(0), u(9)), StorageStatus::DeletedAdded);
        assert_eq!(storage_status(u(7), u(9), u(0)), StorageStatus::ModifiedDeleted);
        assert_eq!(storage_status(u(7), u(0), u(7)), StorageStatus::DeletedRestored);
        assert_eq!(storage_status(u(0), u(9), u(0)), StorageStatus::AddedDeleted);
        assert_eq!(storage_status(u(7), u(9), u(7)), StorageStatus::ModifiedRestored);
    }

    #[test]
    fn clearing_a_nonzero_original_refunds() {
        let schedule = GasSchedule::default();
        assert_eq!(refund_for(StorageStatus::Deleted, &schedule), schedule.sstore_clears_refund);
        assert_eq!(refund_for(StorageStatus::ModifiedDeleted, &schedule), schedule.sstore_clears_refund);
    }

    #[test]
    fn re_adding_a_cleared_slot_earns_no_refund() {
        assert_eq!(refund_for(StorageStatus::DeletedAdded, &GasSchedule::default()), 0);
    }

    #[test]
    fn restoring_to_original_nets_a_combined_refund() {
        let schedule = GasSchedule::default();
        let restored = refund_for(StorageStatus::DeletedRestored, &schedule);
        assert!(restored < 0, "reversing an earlier clear refund should net negative");
    }
}
