//! [`StoragePool`]: an ordered set of fixed-size chunks over one or more
//! backing files.

use crate::{
    chunk::ChunkHandle,
    config::StorageConfig,
    errors::{PoolError, PoolResult},
    offset::ChunkId,
};
use memmap2::MmapMut;
use parking_lot::{Mutex, RwLock};
use std::{
    collections::VecDeque,
    fs::OpenOptions,
    sync::{
        atomic::{AtomicU32, AtomicU64, Ordering},
        Arc,
    },
};
use tracing::{error, warn};

struct BackingFile {
    mapping: Arc<RwLock<MmapMut>>,
    chunks_per_file: u32,
}

/// Presents one or more backing files as an ordered set of fixed-size
/// chunks, with a pool-maintained append tail and chunk reuse driven by
/// compaction.
///
/// Writes are always appended at the tail; readers address chunks by
/// absolute [`crate::ChunkOffset`]. A single [`Mutex`]-guarded free list and
/// allocation cursor keep chunk bookkeeping simple; the mapping itself is
/// guarded per-file so concurrent readers of different chunks never block
/// each other.
pub struct StoragePool {
    config: StorageConfig,
    files: Vec<BackingFile>,
    next_chunk: AtomicU32,
    free_chunks: Mutex<VecDeque<ChunkId>>,
    generation: AtomicU64,
}

impl StoragePool {
    /// Opens (creating if necessary) every configured backing file, sized to
    /// `chunk_size * chunks_per_file`, and memory-maps it for writing.
    pub fn open(config: StorageConfig) -> PoolResult<Self> {
        assert!(config.is_valid(), "invalid StorageConfig");

        let file_len = config.chunk_size as u64 * config.chunks_per_file as u64;
        let mut files = Vec::with_capacity(config.file_paths.len());
        for path in &config.file_paths {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(path)
                .map_err(|source| PoolError::IoFatal { path: path.clone(), source })?;
            file.set_len(file_len).map_err(|source| PoolError::IoFatal { path: path.clone(), source })?;

            // SAFETY: `file` is sized and owned for the lifetime of the mapping.
            let mapping = unsafe { MmapMut::map_mut(&file) }
                .map_err(|source| PoolError::IoFatal { path: path.clone(), source })?;
            files.push(BackingFile { mapping: Arc::new(RwLock::new(mapping)), chunks_per_file: config.chunks_per_file });
        }

        Ok(Self {
            next_chunk: AtomicU32::new(0),
            free_chunks: Mutex::new(VecDeque::new()),
            generation: AtomicU64::new(0),
            files,
            config,
        })
    }

    /// The current generation counter, bumped every time the compactor
    /// advances the retention window far enough to recycle a chunk.
    pub fn seq(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Advances the generation counter. Called by `ferrochain-history` after
    /// a compaction pass makes chunks eligible for reuse.
    pub fn advance_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Returns the next free chunk id, preferring a reclaimed chunk over
    /// extending the tail. Fails with [`PoolError::PoolExhausted`] if the
    /// pool is full and nothing has been recycled.
    pub fn allocate_chunk(&self) -> PoolResult<ChunkId> {
        if let Some(id) = self.free_chunks.lock().pop_front() {
            return Ok(id);
        }
        let total = self.config.total_chunks();
        let id = self.next_chunk.fetch_add(1, Ordering::AcqRel);
        if id >= total {
            // Undo the overshoot so a later `recycle_chunk` call still sees
            // a consistent cursor.
            self.next_chunk.fetch_sub(1, Ordering::AcqRel);
            warn!(total, "storage pool exhausted");
            return Err(PoolError::PoolExhausted);
        }
        Ok(id)
    }

    /// Returns a chunk to the free list. Called by the compactor once a
    /// chunk falls out of the retention window and has been fully rewritten
    /// forward.
    pub fn recycle_chunk(&self, id: ChunkId) {
        self.free_chunks.lock().push_back(id);
    }

    /// Makes chunk `id` resident, returning a handle into its backing
    /// mapping. `generation` is accepted for API symmetry with the
    /// compactor's virtual-offset bookkeeping but does not change which
    /// physical bytes are returned; the caller is expected to have already
    /// resolved a [`crate::VirtualChunkOffset`] to its current physical
    /// chunk id before calling this.
    pub fn activate_chunk(&self, _generation: u64, id: ChunkId) -> PoolResult<ChunkHandle> {
        let chunks_per_file = self.config.chunks_per_file;
        let file_idx = (id / chunks_per_file) as usize;
        let file = self.files.get(file_idx).ok_or(PoolError::ChunkOutOfRange { chunk_id: id })?;
        let local_id = id % chunks_per_file;
        let base = local_id as usize * self.config.chunk_size;
        Ok(ChunkHandle::new(file.mapping.clone(), base, self.config.chunk_size))
    }

    /// Writes `bytes` at `offset` within chunk `id`, padding up to the page
    /// boundary. Fails with [`PoolError::UnalignedWrite`] if `offset` is not
    /// itself page-aligned (partial-page writes are disallowed).
    pub fn write(&self, id: ChunkId, offset: u64, bytes: &[u8]) -> PoolResult<()> {
        let page_size = self.config.page_size as u64;
        if offset % page_size != 0 {
            return Err(PoolError::UnalignedWrite { len: bytes.len(), offset });
        }
        let padded_len = Self::round_up(bytes.len(), self.config.page_size);
        let handle = self.activate_chunk(self.seq(), id)?;
        if padded_len == bytes.len() {
            handle.write_at(offset, bytes);
        } else {
            let mut padded = bytes.to_vec();
            padded.resize(padded_len, 0);
            handle.write_at(offset, &padded);
        }
        Ok(())
    }

    /// Reads `page_count` pages starting at `offset` within chunk `id`.
    pub fn read(&self, id: ChunkId, offset: u64, page_count: usize) -> PoolResult<Vec<u8>> {
        let handle = self.activate_chunk(self.seq(), id)?;
        Ok(handle.read_at(offset, page_count * self.config.page_size))
    }

    /// Rounds `len` up to the next multiple of `page_size`.
    fn round_up(len: usize, page_size: usize) -> usize {
        (len + page_size - 1) / page_size * page_size
    }

    /// The configuration this pool was opened with.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Flushes every backing mapping's dirty pages to disk.
    ///
    /// A failure here is always fatal: it means the OS could not guarantee
    /// durability for bytes we've already told callers are committed.
    pub fn flush(&self) -> PoolResult<()> {
        for (idx, file) in self.files.iter().enumerate() {
            if let Err(source) = file.mapping.read().flush() {
                let path = self.config.file_paths[idx].clone();
                error!(?path, %source, "fatal: storage pool flush failed");
                return Err(PoolError::IoFatal { path, source });
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for StoragePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoragePool")
            .field("files", &self.files.len())
            .field("generation", &self.seq())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_pool(chunks_per_file: u32) -> (tempfile::TempDir, StoragePool) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pool.dat");
        let config = StorageConfig {
            file_paths: vec![path],
            chunk_size: 4096,
            chunks_per_file,
            page_size: 4096,
            hugepages: false,
        };
        let pool = StoragePool::open(config).unwrap();
        (dir, pool)
    }

    #[test]
    fn allocates_sequential_chunks_until_exhausted() {
        let (_dir, pool) = test_pool(2);
        assert_eq!(pool.allocate_chunk().unwrap(), 0);
        assert_eq!(pool.allocate_chunk().unwrap(), 1);
        assert!(matches!(pool.allocate_chunk(), Err(PoolError::PoolExhausted)));
    }

    #[test]
    fn recycled_chunks_are_reused_before_extending_tail() {
        let (_dir, pool) = test_pool(2);
        let a = pool.allocate_chunk().unwrap();
        let _b = pool.allocate_chunk().unwrap();
        pool.recycle_chunk(a);
        assert_eq!(pool.allocate_chunk().unwrap(), a);
    }

    #[test]
    fn write_then_read_round_trips() {
        let (_dir, pool) = test_pool(1);
        let id = pool.allocate_chunk().unwrap();
        let payload = vec![0xAB; 10];
        pool.write(id, 0, &payload).unwrap();
        let read_back = pool.read(id, 0, 1).unwrap();
        assert_eq!(&read_back[..10], &payload[..]);
    }

    #[test]
    fn unaligned_write_offset_is_rejected() {
        let (_dir, pool) = test_pool(1);
        let id = pool.allocate_chunk().unwrap();
        let err = pool.write(id, 7, &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, PoolError::UnalignedWrite { .. }));
    }

    #[test]
    fn activating_out_of_range_chunk_fails() {
        let (_dir, pool) = test_pool(1);
        assert!(matches!(pool.activate_chunk(0, 5), Err(PoolError::ChunkOutOfRange { .. })));
    }
}
