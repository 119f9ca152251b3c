//! A bounded asynchronous submission/completion ring over
//! [`ferrochain_storage_pool`].
//!
//! Models the async I/O layer the trie and node codec read and write
//! through: pinned buffers, bounded in-flight depth, and the option of
//! polling instead of blocking on completion.

mod buffer;
pub use buffer::{Buffer, BufferPool};

mod config;
pub use config::IoRingConfig;

mod errors;
pub use errors::{IoError, IoResult};

mod ring;
pub use ring::IoRing;
