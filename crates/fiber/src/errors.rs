//! Errors for the `ferrochain-fiber` crate.

/// A [`Result`] alias where the error is [`FiberError`].
pub type FiberResult<T> = Result<T, FiberError>;

/// Errors raised by [`crate::FiberPool`] operations.
#[derive(derive_more::Display, Debug)]
pub enum FiberError {
    /// `spawn` was called after the pool's dispatcher had already stopped.
    #[display("fiber pool is shutting down")]
    ShuttingDown,
}

impl std::error::Error for FiberError {}
