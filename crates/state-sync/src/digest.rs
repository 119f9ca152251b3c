//! [`shard_digest`]: a deterministic fingerprint over one shard's upsert
//! stream, computed identically by the server (before sending) and the
//! client (from what it received) so a corrupted or truncated shard can be
//! caught and retried without needing a Merkle range-proof over the trie.

use crate::{prefix::ShardPrefix, protocol::ServerMessage};
use alloy_primitives::keccak256;
use ferrochain_primitives::Hash256;

/// Hashes `upserts` (everything but the terminating [`ServerMessage::Done`])
/// together with `prefix`, in stream order.
pub fn shard_digest(prefix: &ShardPrefix, upserts: &[ServerMessage]) -> Hash256 {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(prefix.nibbles().len() as u64).to_be_bytes());
    buf.extend_from_slice(prefix.nibbles());

    for message in upserts {
        match message {
            ServerMessage::UpsertAccount { address, account } => {
                buf.push(0);
                buf.extend_from_slice(address.as_slice());
                alloy_rlp::Encodable::encode(account, &mut buf);
            }
            ServerMessage::UpsertStorage { address, slot, value } => {
                buf.push(1);
                buf.extend_from_slice(address.as_slice());
                buf.extend_from_slice(&slot.to_be_bytes::<32>());
                buf.extend_from_slice(&value.to_be_bytes::<32>());
            }
            ServerMessage::UpsertCode { code } => {
                buf.push(2);
                buf.extend_from_slice(code.hash().as_slice());
            }
            ServerMessage::UpsertHeader { header } => {
                buf.push(3);
                alloy_rlp::Encodable::encode(header, &mut buf);
            }
            ServerMessage::Done { .. } => {}
        }
    }

    keccak256(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrochain_primitives::{Address, U256};

    #[test]
    fn identical_streams_digest_identically() {
        let prefix = ShardPrefix::new(vec![1, 2]);
        let upserts = vec![ServerMessage::UpsertStorage {
            address: Address::repeat_byte(0x01),
            slot: U256::from(1),
            value: U256::from(2),
        }];
        assert_eq!(shard_digest(&prefix, &upserts), shard_digest(&prefix, &upserts));
    }

    #[test]
    fn a_changed_value_changes_the_digest() {
        let prefix = ShardPrefix::new(vec![1, 2]);
        let a = vec![ServerMessage::UpsertStorage { address: Address::repeat_byte(0x01), slot: U256::from(1), value: U256::from(2) }];
        let b = vec![ServerMessage::UpsertStorage { address: Address::repeat_byte(0x01), slot: U256::from(1), value: U256::from(3) }];
        assert_ne!(shard_digest(&prefix, &a), shard_digest(&prefix, &b));
    }

    #[test]
    fn message_order_is_significant() {
        let prefix = ShardPrefix::new(vec![0]);
        let first = ServerMessage::UpsertStorage { address: Address::repeat_byte(0x01), slot: U256::from(1), value: U256::from(9) };
        let second = ServerMessage::UpsertStorage { address: Address::repeat_byte(0x02), slot: U256::from(1), value: U256::from(9) };
        let ab = vec![first.clone(), second.clone()];
        let ba = vec![second, first];
        assert_ne!(shard_digest(&prefix, &ab), shard_digest(&prefix, &ba));
    }
}
