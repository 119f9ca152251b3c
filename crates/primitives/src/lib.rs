//! Core data model shared by the storage engine and the execution pipeline.
//!
//! This crate defines the types that both sides of the node agree on: the
//! account shape, the incarnation tag used to invalidate stale storage reads
//! after a self-destruct, a zero-allocation nibble-path view over trie keys,
//! and the per-hardfork [`Revision`] dispatch used instead of a trait-object
//! hierarchy.

mod account;
pub use account::Account;

mod incarnation;
pub use incarnation::Incarnation;

mod nibble;
pub use nibble::NibbleView;

mod revision;
pub use revision::Revision;

mod code;
pub use code::Code;

/// A 20-byte account identifier.
pub use alloy_primitives::Address;
/// A 32-byte hash value; used for keccak outputs, code hashes and Merkle hashes.
pub use alloy_primitives::B256 as Hash256;
/// A 256-bit unsigned integer.
pub use alloy_primitives::U256;
