//! [`ChunkHandle`]: a resident, page-aligned view of one chunk.

use memmap2::MmapMut;
use parking_lot::RwLock;
use std::sync::Arc;

/// A residency tag: whether a chunk currently holds live node data or has
/// been reclaimed and marked free for reuse. Mirrors the one-byte type tag
/// that prefixes every chunk on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChunkType {
    /// The chunk holds live, packed, page-aligned nodes.
    Data = 0,
    /// The chunk has been reclaimed and is available for allocation.
    Free = 1,
}

/// A handle to a resident chunk: the backing mapping plus its base byte
/// offset within that mapping.
///
/// `activate_chunk`  returns one of these; readers and
/// writers address bytes relative to `base_offset` without needing to know
/// which physical file backs the chunk.
#[derive(Clone)]
pub struct ChunkHandle {
    mapping: Arc<RwLock<MmapMut>>,
    base_offset: usize,
    len: usize,
}

impl ChunkHandle {
    pub(crate) fn new(mapping: Arc<RwLock<MmapMut>>, base_offset: usize, len: usize) -> Self {
        Self { mapping, base_offset, len }
    }

    /// The size of this chunk in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether this chunk is zero-sized (never constructed in practice, kept
    /// for API symmetry).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reads `len` bytes starting at `offset` within this chunk into a fresh
    /// owned buffer.
    pub fn read_at(&self, offset: u64, len: usize) -> Vec<u8> {
        let start = self.base_offset + offset as usize;
        let guard = self.mapping.read();
        guard[start..start + len].to_vec()
    }

    /// Writes `bytes` at `offset` within this chunk. Callers are responsible
    /// for page alignment; the pool validates it before calling this.
    pub fn write_at(&self, offset: u64, bytes: &[u8]) {
        let start = self.base_offset + offset as usize;
        let mut guard = self.mapping.write();
        guard[start..start + bytes.len()].copy_from_slice(bytes);
    }
}

impl std::fmt::Debug for ChunkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkHandle").field("base_offset", &self.base_offset).field("len", &self.len).finish()
    }
}
