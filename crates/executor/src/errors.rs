//! Errors for the `ferrochain-executor` crate.

use ferrochain_block_state::BlockStateError;
use ferrochain_triedb::TriedbError;

/// A transaction-level validation failure (spec. §7 "Validation errors").
/// Recorded against the transaction and dropped from the block; never fatal
/// to the block itself.
#[derive(derive_more::Display, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The transaction's `chain_id` does not match the executing chain.
    #[display("wrong chain id: expected {expected}, got {actual}")]
    WrongChainId {
        /// The chain id the executor is configured for.
        expected: u64,
        /// The chain id carried by the transaction.
        actual: u64,
    },
    /// The transaction's type is not enabled at the active revision.
    #[display("transaction type {_0} not enabled at the active revision")]
    TypeNotEnabled(u8),
    /// EIP-1559 `max_priority_fee_per_gas` exceeds `max_fee_per_gas`.
    #[display("priority fee {priority} exceeds max fee {max}")]
    PriorityFeeExceedsMaxFee {
        /// The transaction's max priority fee.
        priority: u128,
        /// The transaction's max fee.
        max: u128,
    },
    /// `max_fee_per_gas` is below the block's base fee.
    #[display("max fee {max_fee} below base fee {base_fee}")]
    MaxFeeBelowBaseFee {
        /// The transaction's max fee.
        max_fee: u128,
        /// The block's base fee.
        base_fee: u128,
    },
    /// Computed intrinsic gas exceeds the transaction's gas limit.
    #[display("intrinsic gas {intrinsic} exceeds gas limit {limit}")]
    IntrinsicGasExceedsLimit {
        /// The computed intrinsic gas cost.
        intrinsic: u64,
        /// The transaction's gas limit.
        limit: u64,
    },
    /// Contract-creation `data` exceeds the EIP-3860 init-code size limit.
    #[display("init code size {size} exceeds the limit {limit}")]
    InitCodeTooLarge {
        /// The size of the supplied init code.
        size: usize,
        /// The revision's init-code size limit.
        limit: usize,
    },
    /// The transaction's nonce does not match the sender's current nonce.
    #[display("nonce mismatch: account has {account}, transaction has {tx}")]
    NonceMismatch {
        /// The sender account's current nonce.
        account: u64,
        /// The nonce carried by the transaction.
        tx: u64,
    },
    /// The sender's balance cannot cover `max_fee * gas_limit + value`.
    #[display("insufficient balance: sender has {balance}, upfront cost is {cost}")]
    InsufficientBalance {
        /// The sender's current balance.
        balance: alloy_primitives::U256,
        /// The transaction's total up-front cost.
        cost: alloy_primitives::U256,
    },
    /// The sender account has code and is not a permitted delegated-code
    /// sender under the active revision's EIP-7702 rules.
    #[display("sender account is not an EOA")]
    SenderNotEoa,
    /// Including this transaction would exceed the block's gas limit.
    #[display("block gas limit exceeded: {used} + {tx_limit} > {block_limit}")]
    BlockGasLimitExceeded {
        /// Gas already used by earlier transactions in the block.
        used: u64,
        /// This transaction's own gas limit.
        tx_limit: u64,
        /// The block's gas limit.
        block_limit: u64,
    },
    /// Recovering the sender from the transaction's signature failed.
    #[display("signature recovery failed: {_0}")]
    SignatureError(alloy_primitives::SignatureError),
}

impl core::error::Error for ValidationError {}

/// The error type for the executor crate.
#[derive(derive_more::Display, Debug)]
pub enum ExecutorError {
    /// A transaction-level validation error; the transaction is dropped.
    #[display("validation error: {_0}")]
    Validation(ValidationError),
    /// Block State reported a read or merge error.
    #[display("block state error: {_0}")]
    BlockState(BlockStateError),
    /// Triedb reported a read error.
    #[display("triedb error: {_0}")]
    Triedb(TriedbError),
    /// A transaction exhausted its conflict-retry budget without merging.
    #[display("transaction exhausted its retry budget after {attempts} attempts")]
    RetryBudgetExhausted {
        /// How many attempts were made.
        attempts: usize,
    },
}

impl core::error::Error for ExecutorError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::BlockState(err) => Some(err),
            Self::Triedb(err) => Some(err),
            Self::RetryBudgetExhausted { .. } => None,
        }
    }
}

impl From<ValidationError> for ExecutorError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<BlockStateError> for ExecutorError {
    fn from(err: BlockStateError) -> Self {
        Self::BlockState(err)
    }
}

impl From<TriedbError> for ExecutorError {
    fn from(err: TriedbError) -> Self {
        Self::Triedb(err)
    }
}

/// A [`Result`] type alias for [`ExecutorError`].
pub type ExecutorResult<T> = Result<T, ExecutorError>;
