//! Errors for the `ferrochain-node-codec` crate.

/// A [`Result`] alias where the error is [`CodecError`].
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while serializing or deserializing a [`crate::Node`].
#[derive(derive_more::Display, Debug, PartialEq, Eq)]
pub enum CodecError {
    /// The buffer handed to `deserialize` ended before the declared header
    /// fields could be read.
    #[display("node buffer truncated: need {need} bytes, have {have}")]
    Truncated {
        /// Bytes required to continue decoding.
        need: usize,
        /// Bytes actually available.
        have: usize,
    },
    /// A branch's `child_mask` popcount did not match the number of child
    /// descriptors actually present in the buffer.
    #[display("child_mask popcount {expected} does not match {actual} descriptors")]
    ChildMaskMismatch {
        /// Popcount of the declared mask.
        expected: u32,
        /// Number of descriptors the decoder could actually read.
        actual: u32,
    },
    /// The header declared a path length that does not fit within the
    /// node's remaining byte budget.
    #[display("declared path length {path_len} exceeds node byte budget of {budget}")]
    PathLengthOverflow {
        /// The declared nibble count.
        path_len: usize,
        /// Bytes left in the buffer once the header was consumed.
        budget: usize,
    },
    /// The header's `kind` byte did not match any known node kind.
    #[display("unrecognized node kind tag {tag}")]
    UnknownKind {
        /// The raw tag byte read from disk.
        tag: u8,
    },
    /// A child descriptor's tag byte did not match any known descriptor kind.
    #[display("unrecognized child descriptor tag {tag}")]
    UnknownChildTag {
        /// The raw tag byte read from disk.
        tag: u8,
    },
}

impl std::error::Error for CodecError {}
