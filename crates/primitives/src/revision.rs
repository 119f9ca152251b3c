//! [`Revision`]: the EVM feature set effective at a given block, modeled as a
//! sum type with per-operation dispatch rather than the source's template
//! parameter explosion.

/// The EVM revision (hardfork) active for a block.
///
/// Ordered oldest-to-newest so `revision >= Revision::London` reads
/// naturally. Revisions older than a target chain's oldest hard fork may be
/// omitted by callers; this type carries the full range so it stays
/// chain-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum Revision {
    /// The Ethereum mainnet launch revision.
    Frontier,
    /// EIP-150/EIP-160/EIP-161.
    SpuriousDragon,
    /// EIP-140/EIP-211/EIP-214.
    Byzantium,
    /// EIP-1014/EIP-1052/EIP-1234.
    Constantinople,
    /// EIP-2200 repriced SSTORE gas metering.
    Istanbul,
    /// EIP-2565/EIP-2929/EIP-2930 access lists.
    Berlin,
    /// EIP-1559 base fee, EIP-3529 reduced refunds, EIP-3554 difficulty bomb.
    London,
    /// EIP-3651/EIP-3855/EIP-3860 (warm coinbase, PUSH0, init-code limits).
    Shanghai,
    /// EIP-4844 blob transactions, EIP-4788 beacon root, EIP-1153 transient storage.
    Cancun,
    /// EIP-7702 set-code transactions, EIP-2935 historical block hashes.
    Prague,
}

impl Revision {
    /// Whether EIP-2929/EIP-2930 access lists and warm/cold accounting apply.
    pub const fn has_access_lists(self) -> bool {
        self as u8 >= Self::Berlin as u8
    }

    /// Whether EIP-1559 priority-fee transactions and base fee apply.
    pub const fn has_base_fee(self) -> bool {
        self as u8 >= Self::London as u8
    }

    /// Whether EIP-3529 reduced the gas refund cap (otherwise refunds are
    /// uncapped, pre-London).
    pub const fn has_capped_refund(self) -> bool {
        self as u8 >= Self::London as u8
    }

    /// The divisor applied to `gas_used` to compute the maximum refund, or
    /// `None` pre-London (uncapped).
    pub const fn refund_cap_divisor(self) -> Option<u64> {
        if self.has_capped_refund() {
            Some(5)
        } else {
            None
        }
    }

    /// Whether EIP-3651 makes the coinbase warm at the start of every
    /// transaction.
    pub const fn warms_coinbase(self) -> bool {
        self as u8 >= Self::Shanghai as u8
    }

    /// Whether EIP-3860 bounds `initcode` size during contract creation.
    pub const fn has_init_code_limit(self) -> bool {
        self as u8 >= Self::Shanghai as u8
    }

    /// Whether EIP-1153 transient storage opcodes are available.
    pub const fn has_transient_storage(self) -> bool {
        self as u8 >= Self::Cancun as u8
    }

    /// Whether EIP-4844 blob-carrying transactions are accepted.
    pub const fn has_blob_transactions(self) -> bool {
        self as u8 >= Self::Cancun as u8
    }

    /// Whether a self-destruct only clears the account when it was created
    /// within the same transaction (EIP-6780); otherwise self-destruct always
    /// clears the account and zeroes its storage.
    pub const fn self_destruct_requires_same_tx_create(self) -> bool {
        self as u8 >= Self::Cancun as u8
    }

    /// Whether EIP-7702 delegated-code senders may submit transactions as if
    /// they were an EOA.
    pub const fn allows_delegated_sender(self) -> bool {
        self as u8 >= Self::Prague as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_follows_hardfork_sequence() {
        assert!(Revision::Berlin < Revision::London);
        assert!(Revision::London < Revision::Cancun);
    }

    #[test]
    fn refund_cap_switches_on_at_london() {
        assert_eq!(Revision::Istanbul.refund_cap_divisor(), None);
        assert_eq!(Revision::London.refund_cap_divisor(), Some(5));
        assert_eq!(Revision::Cancun.refund_cap_divisor(), Some(5));
    }

    #[test]
    fn self_destruct_rule_changes_at_cancun() {
        assert!(!Revision::Shanghai.self_destruct_requires_same_tx_create());
        assert!(Revision::Cancun.self_destruct_requires_same_tx_create());
    }
}
