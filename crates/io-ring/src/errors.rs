//! Errors for the `ferrochain-io-ring` crate.

use ferrochain_storage_pool::PoolError;

/// A [`Result`] alias where the error is [`IoError`].
pub type IoResult<T> = Result<T, IoError>;

/// Errors raised by the [`crate::IoRing`].
#[derive(derive_more::Display, Debug)]
pub enum IoError {
    /// The submission channel's bounded capacity has no room; the caller
    /// should back off rather than retry immediately.
    #[display("I/O ring submission queue is full")]
    SubmissionBackpressure,
    /// The storage pool rejected the operation.
    #[display("storage pool error: {_0}")]
    Pool(PoolError),
    /// A non-recoverable I/O error. The process must abort rather than
    /// continue with a possibly-corrupt storage pool;
    /// [`crate::IoRing::abort_on_fatal`] does so.
    #[display("fatal I/O error: {_0}")]
    Fatal(PoolError),
    /// The task servicing a submitted read or write panicked before it
    /// could complete.
    #[display("io-ring worker task panicked")]
    WorkerPanicked,
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Pool(err) | Self::Fatal(err) => Some(err),
            Self::SubmissionBackpressure | Self::WorkerPanicked => None,
        }
    }
}

impl From<PoolError> for IoError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::IoFatal { .. } => Self::Fatal(err),
            other => Self::Pool(other),
        }
    }
}
