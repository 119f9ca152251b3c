//! Ephemeral ordered tries for the per-block receipts/transactions/
//! withdrawals roots.
//!
//! Unlike the account and storage tries, these are built fresh from scratch
//! every block and never read back — they exist only to produce a root hash
//! — so they go straight through `alloy_trie`'s in-memory [`HashBuilder`]
//! rather than through the persistent, versioned [`ferrochain_mpt::Trie`].

use alloy_primitives::B256;
use alloy_rlp::{BufMut, Encodable};
use alloy_trie::{HashBuilder, Nibbles};

/// Computes the root of an ordered list of RLP-encodable items, keyed by
/// their RLP-encoded index per Ethereum's transactions/receipts trie
/// convention.
pub fn ordered_trie_root<T, F>(items: &[T], mut encode: F) -> B256
where
    F: FnMut(&T, &mut dyn BufMut),
{
    if items.is_empty() {
        return alloy_consensus::EMPTY_ROOT_HASH;
    }

    let mut index_buf = Vec::new();
    let mut value_buf = Vec::new();
    let len = items.len();

    let mut hb = HashBuilder::default();
    for i in 0..len {
        let index = adjust_index_for_rlp(i, len);

        index_buf.clear();
        index.encode(&mut index_buf);

        value_buf.clear();
        encode(&items[index], &mut value_buf);

        hb.add_leaf(Nibbles::unpack(&index_buf), &value_buf);
    }
    hb.root()
}

/// Ethereum's RLP trie index ordering quirk: index `0` sorts last because
/// its RLP encoding (`0x80`) is lexicographically larger than `0x01..0x7f`.
const fn adjust_index_for_rlp(i: usize, len: usize) -> usize {
    if i > 0x7f {
        i
    } else if i == 0x7f || i + 1 == len {
        0
    } else {
        i + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_has_the_empty_root() {
        let items: Vec<u64> = Vec::new();
        assert_eq!(ordered_trie_root(&items, |v, buf| v.encode(buf)), alloy_consensus::EMPTY_ROOT_HASH);
    }

    #[test]
    fn single_item_root_is_deterministic() {
        let items = vec![vec![0xAAu8; 4]];
        let root_a = ordered_trie_root(&items, |v, buf| buf.put_slice(v));
        let root_b = ordered_trie_root(&items, |v, buf| buf.put_slice(v));
        assert_eq!(root_a, root_b);
    }
}
