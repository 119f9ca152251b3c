//! Binary encode/decode of a [`Node`] to and from a page-aligned byte range.
//!
//! Layout, in order: a fixed 7-byte header (kind, flags, child mask,
//! descriptor count, path length), the packed path nibbles, child
//! descriptors (branch/extension only), an optional length-prefixed value,
//! and a trailing 32-byte Merkle hash.

use crate::{
    errors::{CodecError, CodecResult},
    node::{ChildRef, Node, NodePath},
};
use ferrochain_primitives::Hash256;
use ferrochain_storage_pool::ChunkOffset;

const HEADER_LEN: usize = 7;
const DESCRIPTOR_LEN: usize = 43;
const HASH_LEN: usize = 32;

const KIND_LEAF: u8 = 0;
const KIND_EXTENSION: u8 = 1;
const KIND_BRANCH: u8 = 2;

const FLAG_BRANCH_HAS_VALUE: u8 = 0b0000_0001;

const CHILD_TAG_EMBEDDED: u8 = 0;
const CHILD_TAG_ON_DISK: u8 = 1;

/// Serializes `node` into `buf`, appending rather than overwriting, and
/// returns the number of bytes written.
pub fn serialize(node: &Node, buf: &mut Vec<u8>) -> usize {
    let start = buf.len();
    match node {
        Node::Leaf { path, value, hash } => {
            write_header(buf, KIND_LEAF, 0, 0, 0, path.len);
            buf.extend_from_slice(&path.packed);
            write_value(buf, value);
            buf.extend_from_slice(hash.as_slice());
        }
        Node::Extension { path, child, hash } => {
            write_header(buf, KIND_EXTENSION, 0, 0, 1, path.len);
            buf.extend_from_slice(&path.packed);
            buf.extend_from_slice(&encode_child_ref(child));
            buf.extend_from_slice(hash.as_slice());
        }
        Node::Branch { children, value, hash } => {
            let mask = node.child_mask();
            let descriptor_count = mask.count_ones() as u8;
            let flags = if value.is_some() { FLAG_BRANCH_HAS_VALUE } else { 0 };
            write_header(buf, KIND_BRANCH, flags, mask, descriptor_count, 0);
            for child in children.iter().flatten() {
                buf.extend_from_slice(&encode_child_ref(child));
            }
            if let Some(value) = value {
                write_value(buf, value);
            }
            buf.extend_from_slice(hash.as_slice());
        }
    }
    buf.len() - start
}

/// Deserializes one [`Node`] starting at `offset_in_buf`, returning the node
/// and the number of bytes consumed.
pub fn deserialize(buf: &[u8], offset_in_buf: usize) -> CodecResult<(Node, usize)> {
    let buf = &buf[offset_in_buf..];
    require_len(buf, HEADER_LEN)?;

    let kind = buf[0];
    let flags = buf[1];
    let child_mask = u16::from_le_bytes([buf[2], buf[3]]);
    let descriptor_count = buf[4];
    let path_len = u16::from_le_bytes([buf[5], buf[6]]) as usize;

    if kind == KIND_BRANCH {
        let expected = child_mask.count_ones();
        if expected != descriptor_count as u32 {
            return Err(CodecError::ChildMaskMismatch { expected, actual: descriptor_count as u32 });
        }
    }

    let mut cursor = HEADER_LEN;
    let packed_len = NodePath::packed_len(path_len);
    let remaining_budget = buf.len().saturating_sub(cursor);
    if packed_len > remaining_budget {
        return Err(CodecError::PathLengthOverflow { path_len, budget: remaining_budget });
    }
    require_len(buf, cursor + packed_len)?;
    let path = NodePath { packed: buf[cursor..cursor + packed_len].to_vec(), len: path_len };
    cursor += packed_len;

    let node = match kind {
        KIND_LEAF => {
            let (value, consumed) = read_value(buf, cursor)?;
            cursor += consumed;
            let hash = read_hash(buf, cursor)?;
            cursor += HASH_LEN;
            Node::Leaf { path, value, hash }
        }
        KIND_EXTENSION => {
            require_len(buf, cursor + DESCRIPTOR_LEN)?;
            let child = decode_child_ref(&buf[cursor..cursor + DESCRIPTOR_LEN])?;
            cursor += DESCRIPTOR_LEN;
            let hash = read_hash(buf, cursor)?;
            cursor += HASH_LEN;
            Node::Extension { path, child, hash }
        }
        KIND_BRANCH => {
            let mut children: [Option<ChildRef>; 16] = Default::default();
            for i in 0..16u16 {
                if child_mask & (1 << i) != 0 {
                    require_len(buf, cursor + DESCRIPTOR_LEN)?;
                    children[i as usize] = Some(decode_child_ref(&buf[cursor..cursor + DESCRIPTOR_LEN])?);
                    cursor += DESCRIPTOR_LEN;
                }
            }
            let value = if flags & FLAG_BRANCH_HAS_VALUE != 0 {
                let (value, consumed) = read_value(buf, cursor)?;
                cursor += consumed;
                Some(value)
            } else {
                None
            };
            let hash = read_hash(buf, cursor)?;
            cursor += HASH_LEN;
            Node::Branch { children, value, hash }
        }
        other => return Err(CodecError::UnknownKind { tag: other }),
    };

    Ok((node, cursor))
}

/// The number of `page_size`-sized pages needed to hold a node of
/// `byte_len` bytes.
pub const fn node_disk_pages(byte_len: usize, page_size: usize) -> u32 {
    byte_len.div_ceil(page_size) as u32
}

fn write_header(buf: &mut Vec<u8>, kind: u8, flags: u8, child_mask: u16, descriptor_count: u8, path_len: usize) {
    buf.push(kind);
    buf.push(flags);
    buf.extend_from_slice(&child_mask.to_le_bytes());
    buf.push(descriptor_count);
    buf.extend_from_slice(&(path_len as u16).to_le_bytes());
}

fn write_value(buf: &mut Vec<u8>, value: &[u8]) {
    buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
    buf.extend_from_slice(value);
}

fn read_value(buf: &[u8], offset: usize) -> CodecResult<(Vec<u8>, usize)> {
    require_len(buf, offset + 4)?;
    let len = u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]]) as usize;
    require_len(buf, offset + 4 + len)?;
    Ok((buf[offset + 4..offset + 4 + len].to_vec(), 4 + len))
}

fn read_hash(buf: &[u8], offset: usize) -> CodecResult<Hash256> {
    require_len(buf, offset + HASH_LEN)?;
    Ok(Hash256::from_slice(&buf[offset..offset + HASH_LEN]))
}

fn require_len(buf: &[u8], need: usize) -> CodecResult<()> {
    if buf.len() < need {
        return Err(CodecError::Truncated { need, have: buf.len() });
    }
    Ok(())
}

fn encode_child_ref(child: &ChildRef) -> [u8; DESCRIPTOR_LEN] {
    let mut out = [0u8; DESCRIPTOR_LEN];
    match child {
        ChildRef::Embedded(rlp) => {
            debug_assert!(rlp.len() <= crate::node::MAX_EMBEDDED_LEN);
            out[0] = CHILD_TAG_EMBEDDED;
            out[1] = rlp.len() as u8;
            out[2..2 + rlp.len()].copy_from_slice(rlp);
        }
        ChildRef::OnDisk { hash, offset } => {
            out[0] = CHILD_TAG_ON_DISK;
            out[1..1 + HASH_LEN].copy_from_slice(hash.as_slice());
            let base = 1 + HASH_LEN;
            out[base..base + 3].copy_from_slice(&offset.chunk_id().to_be_bytes()[1..4]);
            out[base + 3..base + 8].copy_from_slice(&offset.byte_offset().to_be_bytes()[3..8]);
            out[base + 8..base + 10].copy_from_slice(&offset.page_count_hint().to_be_bytes());
        }
    }
    out
}

fn decode_child_ref(bytes: &[u8]) -> CodecResult<ChildRef> {
    match bytes[0] {
        CHILD_TAG_EMBEDDED => {
            let len = bytes[1] as usize;
            Ok(ChildRef::Embedded(bytes[2..2 + len].to_vec()))
        }
        CHILD_TAG_ON_DISK => {
            let hash = Hash256::from_slice(&bytes[1..1 + HASH_LEN]);
            let base = 1 + HASH_LEN;
            let chunk_id = u32::from_be_bytes([0, bytes[base], bytes[base + 1], bytes[base + 2]]);
            let byte_offset = u64::from_be_bytes([
                0,
                0,
                0,
                bytes[base + 3],
                bytes[base + 4],
                bytes[base + 5],
                bytes[base + 6],
                bytes[base + 7],
            ]);
            let page_count_hint = u16::from_be_bytes([bytes[base + 8], bytes[base + 9]]);
            Ok(ChildRef::OnDisk { hash, offset: ChunkOffset::new(chunk_id, byte_offset, page_count_hint) })
        }
        other => Err(CodecError::UnknownChildTag { tag: other }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrochain_primitives::NibbleView;

    fn leaf(path_nibbles: &[u8], value: Vec<u8>) -> Node {
        let packed: Vec<u8> = path_nibbles.chunks(2).map(|c| (c[0] << 4) | c.get(1).copied().unwrap_or(0)).collect();
        let view = NibbleView::new(&packed).substr(0, path_nibbles.len());
        Node::Leaf { path: NodePath::from_view(&view), value, hash: Hash256::repeat_byte(0xAA) }
    }

    #[test]
    fn leaf_round_trips() {
        let node = leaf(&[1, 2, 3], vec![9, 9, 9]);
        let mut buf = Vec::new();
        let written = serialize(&node, &mut buf);
        assert_eq!(written, buf.len());
        let (decoded, consumed) = deserialize(&buf, 0).unwrap();
        assert_eq!(consumed, written);
        assert_eq!(decoded, node);
    }

    #[test]
    fn leaf_with_odd_path_round_trips() {
        let node = leaf(&[1, 2, 3, 4, 5], vec![]);
        let mut buf = Vec::new();
        serialize(&node, &mut buf);
        let (decoded, _) = deserialize(&buf, 0).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn extension_round_trips_with_embedded_child() {
        let packed = vec![0x12];
        let view = NibbleView::new(&packed);
        let node = Node::Extension {
            path: NodePath::from_view(&view),
            child: ChildRef::Embedded(vec![0x11; 20]),
            hash: Hash256::repeat_byte(0x22),
        };
        let mut buf = Vec::new();
        serialize(&node, &mut buf);
        let (decoded, _) = deserialize(&buf, 0).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn extension_round_trips_with_on_disk_child() {
        let packed = vec![0xab];
        let view = NibbleView::new(&packed);
        let offset = ChunkOffset::new(0x123456, 0xabcdef0123, 7);
        let node = Node::Extension {
            path: NodePath::from_view(&view),
            child: ChildRef::OnDisk { hash: Hash256::repeat_byte(0x99), offset },
            hash: Hash256::repeat_byte(0x33),
        };
        let mut buf = Vec::new();
        serialize(&node, &mut buf);
        let (decoded, _) = deserialize(&buf, 0).unwrap();
        assert_eq!(decoded, node);
        match decoded {
            Node::Extension { child: ChildRef::OnDisk { hash, offset: decoded_offset }, .. } => {
                assert_eq!(hash, Hash256::repeat_byte(0x99));
                assert_eq!(decoded_offset.chunk_id(), offset.chunk_id());
                assert_eq!(decoded_offset.byte_offset(), offset.byte_offset());
                assert_eq!(decoded_offset.page_count_hint(), 7);
            }
            _ => panic!("expected on-disk child"),
        }
    }

    #[test]
    fn branch_round_trips_with_sparse_children_and_value() {
        let mut children: [Option<ChildRef>; 16] = Default::default();
        children[0] = Some(ChildRef::Embedded(vec![0x01; 10]));
        children[15] = Some(ChildRef::OnDisk { hash: Hash256::repeat_byte(0x02), offset: ChunkOffset::new(1, 2, 3) });
        let node = Node::Branch { children, value: Some(vec![1, 2, 3]), hash: Hash256::repeat_byte(0x44) };
        let mut buf = Vec::new();
        let written = serialize(&node, &mut buf);
        let (decoded, consumed) = deserialize(&buf, 0).unwrap();
        assert_eq!(consumed, written);
        assert_eq!(decoded, node);
    }

    #[test]
    fn branch_round_trips_with_no_value() {
        let mut children: [Option<ChildRef>; 16] = Default::default();
        children[3] = Some(ChildRef::Embedded(vec![0x05; 5]));
        let node = Node::Branch { children, value: None, hash: Hash256::repeat_byte(0x66) };
        let mut buf = Vec::new();
        serialize(&node, &mut buf);
        let (decoded, _) = deserialize(&buf, 0).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn deserialize_offset_in_buf_skips_preceding_bytes() {
        let node = leaf(&[0xa, 0xb], vec![1]);
        let mut buf = vec![0xFF; 5];
        serialize(&node, &mut buf);
        let (decoded, _) = deserialize(&buf, 5).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let node = leaf(&[1, 2], vec![1, 2, 3, 4]);
        let mut buf = Vec::new();
        serialize(&node, &mut buf);
        buf.truncate(buf.len() - 1);
        assert!(matches!(deserialize(&buf, 0), Err(CodecError::Truncated { .. })));
    }

    #[test]
    fn corrupt_child_mask_is_rejected() {
        let mut children: [Option<ChildRef>; 16] = Default::default();
        children[0] = Some(ChildRef::Embedded(vec![0x00; 3]));
        let node = Node::Branch { children, value: None, hash: Hash256::ZERO };
        let mut buf = Vec::new();
        serialize(&node, &mut buf);
        // Corrupt the descriptor_count byte (header offset 4) so it no
        // longer matches the mask's popcount.
        buf[4] = 2;
        assert!(matches!(deserialize(&buf, 0), Err(CodecError::ChildMaskMismatch { .. })));
    }

    #[test]
    fn node_disk_pages_rounds_up() {
        assert_eq!(node_disk_pages(1, 4096), 1);
        assert_eq!(node_disk_pages(4096, 4096), 1);
        assert_eq!(node_disk_pages(4097, 4096), 2);
        assert_eq!(node_disk_pages(0, 4096), 0);
    }
}
