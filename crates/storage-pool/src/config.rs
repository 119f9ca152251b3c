//! Configuration for the [`crate::StoragePool`].

use std::path::PathBuf;

/// Construction parameters for a [`crate::StoragePool`].
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Backing file paths. Each is treated as an ordered run of
    /// `chunks_per_file` fixed-size chunks.
    pub file_paths: Vec<PathBuf>,
    /// Size of one chunk in bytes. Must be a power of two.
    pub chunk_size: usize,
    /// Number of chunks per backing file.
    pub chunks_per_file: u32,
    /// Page size writes are padded up to. Typically 4 KiB.
    pub page_size: usize,
    /// Whether to request transparent hugepages for the backing mappings.
    pub hugepages: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            file_paths: Vec::new(),
            chunk_size: 2 * 1024 * 1024,
            chunks_per_file: 512,
            page_size: 4096,
            hugepages: false,
        }
    }
}

impl StorageConfig {
    /// Whether `chunk_size` is a power of two, as required.
    pub fn is_valid(&self) -> bool {
        self.chunk_size.is_power_of_two()
            && self.page_size.is_power_of_two()
            && self.chunk_size % self.page_size == 0
            && !self.file_paths.is_empty()
    }

    /// Total chunk capacity across all configured files.
    pub fn total_chunks(&self) -> u32 {
        self.chunks_per_file.saturating_mul(self.file_paths.len() as u32)
    }
}
