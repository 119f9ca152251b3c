//! RLP encoding of [`Node`]s for Merkle hashing, and decoding of embedded
//! child subtrees back into a [`Node`].
//!
//! Layout matches the standard Ethereum MPT node RLP (`rlp([v0..v15, value])`
//! for a branch, `rlp([hex_prefix(path), value_or_child])` for a leaf or
//! extension) so a node's hash is computed exactly the way a reader familiar
//! with Ethereum tries would expect, even though the on-disk form
//! (`ferrochain_node_codec`) is a different, page-aligned binary layout.
//! Grounded on `kona-mpt`'s `TrieNode` RLP decode (`crates/mpt/src/node.rs`).

use crate::errors::{MptError, MptResult};
use alloy_primitives::Bytes;
use alloy_rlp::{Encodable, Header};
use crate::state_machine::Compute;
use ferrochain_node_codec::{ChildRef, Node, NodePath};

const PREFIX_EXTENSION_EVEN: u8 = 0;
const PREFIX_EXTENSION_ODD: u8 = 1;
const PREFIX_LEAF_EVEN: u8 = 2;
const PREFIX_LEAF_ODD: u8 = 3;

/// Hex-prefix encodes `nibbles` (raw nibble values, one per element) per the
/// standard MPT compact path encoding.
pub fn hex_prefix(nibbles: &[u8], is_leaf: bool) -> Vec<u8> {
    let odd = nibbles.len() % 2 == 1;
    let prefix = match (is_leaf, odd) {
        (false, false) => PREFIX_EXTENSION_EVEN,
        (false, true) => PREFIX_EXTENSION_ODD,
        (true, false) => PREFIX_LEAF_EVEN,
        (true, true) => PREFIX_LEAF_ODD,
    };
    let mut out = Vec::with_capacity(nibbles.len() / 2 + 1);
    let mut chunks = nibbles.iter().copied();
    if odd {
        out.push((prefix << 4) | chunks.next().unwrap());
    } else {
        out.push(prefix << 4);
    }
    loop {
        let Some(hi) = chunks.next() else { break };
        let lo = chunks.next().unwrap_or(0);
        out.push((hi << 4) | lo);
    }
    out
}

fn nibble_vec(path: &NodePath) -> Vec<u8> {
    let view = path.as_view();
    (0..view.len()).map(|i| view.get(i).unwrap()).collect()
}

fn child_rlp_item(child: &ChildRef, out: &mut Vec<u8>) {
    match child {
        ChildRef::Embedded(rlp) => out.extend_from_slice(rlp),
        ChildRef::OnDisk { hash, .. } => Bytes::copy_from_slice(hash.as_slice()).encode(out),
    }
}

/// Encodes `node`'s RLP representation, used both as the Merkle hash
/// preimage and, when short enough, as the embedded form stored in the
/// parent's descriptor.
pub fn encode_node_rlp(node: &Node) -> Vec<u8> {
    let mut body = Vec::new();
    match node {
        Node::Leaf { path, value, .. } => {
            let encoded_path = hex_prefix(&nibble_vec(path), true);
            Bytes::from(encoded_path).encode(&mut body);
            Bytes::copy_from_slice(value).encode(&mut body);
        }
        Node::Extension { path, child, .. } => {
            let encoded_path = hex_prefix(&nibble_vec(path), false);
            Bytes::from(encoded_path).encode(&mut body);
            child_rlp_item(child, &mut body);
        }
        Node::Branch { children, value, .. } => {
            for child in children {
                match child {
                    Some(child) => child_rlp_item(child, &mut body),
                    None => body.push(0x80),
                }
            }
            match value {
                Some(value) => Bytes::copy_from_slice(value).encode(&mut body),
                None => body.push(0x80),
            }
        }
    }
    let mut out = Vec::with_capacity(body.len() + 4);
    Header { list: true, payload_length: body.len() }.encode(&mut out);
    out.extend_from_slice(&body);
    out
}

/// Decodes `rlp` — an embedded child's raw RLP bytes — back into a [`Node`]
/// whose own children remain unresolved [`ChildRef`]s.
///
/// Every child of an embedded node is itself embedded: a child referenced by
/// hash alone costs 33 bytes, which already exceeds
/// [`ferrochain_node_codec::MAX_EMBEDDED_LEN`], so a node small enough to be
/// embedded can never contain an on-disk child. This lets decoding treat
/// every non-empty child item as another embedded subtree.
pub fn decode_embedded(rlp: &[u8], compute: Compute) -> MptResult<Node> {
    let items = top_level_items(rlp)?;
    match items.len() {
        17 => {
            let mut children: [Option<ChildRef>; 16] = Default::default();
            for (i, item) in items.iter().take(16).enumerate() {
                if !item.is_empty_string {
                    children[i] = Some(ChildRef::Embedded(item.bytes.to_vec()));
                }
            }
            let value = if items[16].is_empty_string { None } else { Some(items[16].payload().to_vec()) };
            let hash = compute.hash(rlp);
            Ok(Node::Branch { children, value, hash })
        }
        2 => {
            let path_item = &items[0];
            let path_bytes = path_item.payload();
            if path_bytes.is_empty() {
                return Err(MptError::CorruptNode(ferrochain_node_codec::CodecError::Truncated { need: 1, have: 0 }));
            }
            let nibbles = hex_prefix_decode(path_bytes);
            let path = pack_nibbles(&nibbles);
            let hash = compute.hash(rlp);
            match path_bytes[0] >> 4 {
                PREFIX_LEAF_EVEN | PREFIX_LEAF_ODD => {
                    Ok(Node::Leaf { path, value: items[1].payload().to_vec(), hash })
                }
                PREFIX_EXTENSION_EVEN | PREFIX_EXTENSION_ODD => {
                    let child = if items[1].is_empty_string {
                        return Err(MptError::CorruptNode(ferrochain_node_codec::CodecError::UnknownChildTag { tag: 0 }));
                    } else {
                        ChildRef::Embedded(items[1].bytes.to_vec())
                    };
                    Ok(Node::Extension { path, child, hash })
                }
                other => Err(MptError::CorruptNode(ferrochain_node_codec::CodecError::UnknownKind { tag: other })),
            }
        }
        other => Err(MptError::CorruptNode(ferrochain_node_codec::CodecError::UnknownKind { tag: other as u8 })),
    }
}

fn pack_nibbles(nibbles: &[u8]) -> NodePath {
    let mut packed = Vec::with_capacity(nibbles.len().div_ceil(2));
    let mut iter = nibbles.iter().copied();
    while let Some(hi) = iter.next() {
        let lo = iter.next().unwrap_or(0);
        packed.push((hi << 4) | lo);
    }
    NodePath { packed, len: nibbles.len() }
}

fn hex_prefix_decode(encoded: &[u8]) -> Vec<u8> {
    let odd = encoded[0] & 0x10 != 0;
    let mut nibbles = Vec::with_capacity(encoded.len() * 2);
    if odd {
        nibbles.push(encoded[0] & 0x0f);
    }
    for byte in &encoded[1..] {
        nibbles.push(byte >> 4);
        nibbles.push(byte & 0x0f);
    }
    nibbles
}

/// One RLP item as found directly inside a list's payload: its full span
/// (header plus payload) and whether it's a list or a string.
struct RlpItem<'a> {
    bytes: &'a [u8],
    header_len: usize,
    is_empty_string: bool,
}

impl<'a> RlpItem<'a> {
    fn payload(&self) -> &'a [u8] {
        &self.bytes[self.header_len..]
    }
}

fn top_level_items(buf: &[u8]) -> MptResult<Vec<RlpItem<'_>>> {
    let (header_len, payload_len, is_list) = item_span(buf)?;
    if !is_list {
        return Err(MptError::CorruptNode(ferrochain_node_codec::CodecError::UnknownKind { tag: buf.first().copied().unwrap_or(0) }));
    }
    let mut payload = &buf[header_len..header_len + payload_len];
    let mut items = Vec::new();
    while !payload.is_empty() {
        let (item_header_len, item_payload_len, _) = item_span(payload)?;
        let total = item_header_len + item_payload_len;
        let is_empty_string = item_header_len == 1 && item_payload_len == 0 && payload[0] == 0x80;
        items.push(RlpItem { bytes: &payload[..total], header_len: item_header_len, is_empty_string });
        payload = &payload[total..];
    }
    Ok(items)
}

/// Returns `(header_len, payload_len, is_list)` for the single RLP item
/// starting at `buf[0]`.
fn item_span(buf: &[u8]) -> MptResult<(usize, usize, bool)> {
    let truncated = || MptError::CorruptNode(ferrochain_node_codec::CodecError::Truncated { need: 1, have: buf.len() });
    let first = *buf.first().ok_or_else(truncated)?;
    match first {
        0x00..=0x7f => Ok((0, 1, false)),
        0x80..=0xb7 => Ok((1, (first - 0x80) as usize, false)),
        0xb8..=0xbf => {
            let len_of_len = (first - 0xb7) as usize;
            let len_bytes = buf.get(1..1 + len_of_len).ok_or_else(truncated)?;
            Ok((1 + len_of_len, be_bytes_to_usize(len_bytes), false))
        }
        0xc0..=0xf7 => Ok((1, (first - 0xc0) as usize, true)),
        0xf8..=0xff => {
            let len_of_len = (first - 0xf7) as usize;
            let len_bytes = buf.get(1..1 + len_of_len).ok_or_else(truncated)?;
            Ok((1 + len_of_len, be_bytes_to_usize(len_bytes), true))
        }
    }
}

fn be_bytes_to_usize(bytes: &[u8]) -> usize {
    bytes.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrochain_primitives::{Hash256, NibbleView};

    fn leaf(nibbles: &[u8], value: Vec<u8>) -> Node {
        let packed: Vec<u8> = nibbles.chunks(2).map(|c| (c[0] << 4) | c.get(1).copied().unwrap_or(0)).collect();
        let view = NibbleView::new(&packed).substr(0, nibbles.len());
        Node::Leaf { path: NodePath::from_view(&view), value, hash: Hash256::ZERO }
    }

    #[test]
    fn hex_prefix_roundtrips_through_decode() {
        for (nibbles, is_leaf) in [
            (vec![1, 2, 3], true),
            (vec![1, 2, 3, 4], true),
            (vec![], false),
            (vec![0xa], false),
        ] {
            let encoded = hex_prefix(&nibbles, is_leaf);
            let decoded = hex_prefix_decode(&encoded);
            assert_eq!(decoded, nibbles);
            let tag = encoded[0] >> 4;
            let decoded_is_leaf = matches!(tag, PREFIX_LEAF_EVEN | PREFIX_LEAF_ODD);
            assert_eq!(decoded_is_leaf, is_leaf);
        }
    }

    #[test]
    fn small_leaf_round_trips_through_rlp_and_embedded_decode() {
        let node = leaf(&[1, 2], vec![9, 9]);
        let rlp = encode_node_rlp(&node);
        assert!(rlp.len() <= ferrochain_node_codec::MAX_EMBEDDED_LEN);
        let decoded = decode_embedded(&rlp, Compute::Keccak).unwrap();
        match decoded {
            Node::Leaf { path, value, .. } => {
                assert_eq!(nibble_vec(&path), vec![1, 2]);
                assert_eq!(value, vec![9, 9]);
            }
            _ => panic!("expected leaf"),
        }
    }

    #[test]
    fn branch_with_embedded_and_empty_children_round_trips() {
        let mut children: [Option<ChildRef>; 16] = Default::default();
        let inner = leaf(&[5], vec![1]);
        let inner_rlp = encode_node_rlp(&inner);
        children[3] = Some(ChildRef::Embedded(inner_rlp));
        let node = Node::Branch { children, value: Some(vec![7]), hash: Hash256::ZERO };
        let rlp = encode_node_rlp(&node);
        let decoded = decode_embedded(&rlp, Compute::Keccak).unwrap();
        match decoded {
            Node::Branch { children, value, .. } => {
                assert_eq!(value, Some(vec![7]));
                assert!(children[3].is_some());
                assert!(children[0].is_none());
            }
            _ => panic!("expected branch"),
        }
    }
}
