//! Contract [`Code`], addressed by its keccak hash.

use crate::Hash256;
use alloy_primitives::{keccak256, Bytes};

/// An immutable blob of contract bytecode, addressed by `keccak256(bytes)`.
///
/// Once stored under its hash, code is never mutated; a new deployment always
/// produces a new hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    hash: Hash256,
    bytes: Bytes,
}

impl Code {
    /// Wraps `bytes`, computing its keccak hash.
    pub fn new(bytes: Bytes) -> Self {
        let hash = keccak256(&bytes);
        Self { hash, bytes }
    }

    /// The keccak256 hash addressing this code.
    pub fn hash(&self) -> Hash256 {
        self.hash
    }

    /// The raw bytecode.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// The length of the bytecode in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the bytecode is empty (an EOA's implicit code).
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_consensus::constants::KECCAK_EMPTY;

    #[test]
    fn empty_code_hashes_to_keccak_empty() {
        let code = Code::new(Bytes::new());
        assert_eq!(code.hash(), KECCAK_EMPTY);
    }

    #[test]
    fn nonempty_code_hashes_its_bytes() {
        let code = Code::new(Bytes::from_static(&[0x60, 0x01]));
        assert_eq!(code.hash(), keccak256([0x60, 0x01]));
    }
}
