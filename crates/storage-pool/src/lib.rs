//! Raw, block-addressable storage across one or more backing files.
//!
//! Presents chunk allocation, an append-only write tail and page-aligned
//! reads/writes as the foundation the async I/O ring and the node codec
//! build on.

mod chunk;
pub use chunk::{ChunkHandle, ChunkType};

mod config;
pub use config::StorageConfig;

mod errors;
pub use errors::{PoolError, PoolResult};

mod offset;
pub use offset::{ChunkId, ChunkOffset, VirtualChunkOffset};

mod pool;
pub use pool::StoragePool;
