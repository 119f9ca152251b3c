//! [`ChunkOffset`] and [`VirtualChunkOffset`]: addresses into the storage
//! pool's chunk space.

/// A chunk identifier. Logically 24 bits wide on disk; kept as
/// a `u32` in memory and masked on construction so downstream arithmetic
/// doesn't need to special-case the narrower width.
pub type ChunkId = u32;

const CHUNK_ID_MASK: u32 = (1 << 24) - 1;
const BYTE_OFFSET_MASK: u64 = (1 << 40) - 1;

/// An absolute address of bytes within the storage pool: a chunk id plus a
/// byte offset inside that chunk, with a page-count hint so a reader can
/// issue one correctly sized read instead of probing.
///
/// The hint is a full `u16` page count (up to 256 MiB at a 4 KiB page size)
/// rather than a narrower spare-bit field, so callers that exceed it get a
/// codec error instead of silent wraparound (see `ferrochain-node-codec`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkOffset {
    chunk_id: ChunkId,
    byte_offset: u64,
    page_count_hint: u16,
}

impl ChunkOffset {
    /// Builds a chunk offset, masking `chunk_id` and `byte_offset` to their
    /// on-disk bit widths.
    pub const fn new(chunk_id: ChunkId, byte_offset: u64, page_count_hint: u16) -> Self {
        Self {
            chunk_id: chunk_id & CHUNK_ID_MASK,
            byte_offset: byte_offset & BYTE_OFFSET_MASK,
            page_count_hint,
        }
    }

    /// The chunk this offset addresses into.
    pub const fn chunk_id(&self) -> ChunkId {
        self.chunk_id
    }

    /// The byte offset within the chunk.
    pub const fn byte_offset(&self) -> u64 {
        self.byte_offset
    }

    /// The page-count hint recorded by the writer, letting a reader size its
    /// read without a second round trip.
    pub const fn page_count_hint(&self) -> u16 {
        self.page_count_hint
    }
}

/// A [`ChunkOffset`] tagged with the compaction generation that produced it,
/// letting the compactor distinguish the same physical chunk id across
/// rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VirtualChunkOffset {
    /// The compaction generation this offset was written under.
    pub generation: u64,
    /// The physical address.
    pub offset: ChunkOffset,
}

impl VirtualChunkOffset {
    /// Pairs a generation with a physical offset.
    pub const fn new(generation: u64, offset: ChunkOffset) -> Self {
        Self { generation, offset }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_oversized_chunk_id() {
        let offset = ChunkOffset::new(u32::MAX, 0, 0);
        assert_eq!(offset.chunk_id(), CHUNK_ID_MASK);
    }

    #[test]
    fn masks_oversized_byte_offset() {
        let offset = ChunkOffset::new(0, u64::MAX, 0);
        assert_eq!(offset.byte_offset(), BYTE_OFFSET_MASK);
    }

    #[test]
    fn preserves_page_count_hint_up_to_u16_max() {
        let offset = ChunkOffset::new(1, 2, u16::MAX);
        assert_eq!(offset.page_count_hint(), u16::MAX);
    }
}
