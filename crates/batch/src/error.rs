//! Batch Error Types
//!
//! Per-file failures are not errors here; they are
//! [`Failure`](pressroom_transform::Failure) outcomes. These kinds only
//! describe misuse of the completion bookkeeping.

use derive_more::{Display, Error};

/// A batch error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for batch operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// More outcomes were recorded than files were submitted.
    #[display("batch of {expected} already complete")]
    Overflow { expected: usize },
    /// The outcome stream ended before every file reported back.
    #[display("batch ended after {recorded} of {expected} outcomes")]
    Incomplete { recorded: usize, expected: usize },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
