//! Delivery Error Types

use derive_more::{Display, Error};

/// A delivery error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Unknown, expired or already downloaded.
    #[display("artifact not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// The artifact is registered but its bytes could not be opened.
    #[display("artifact unavailable: {_0}")]
    Unavailable(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Never: a failed download consumes the artifact all the same.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
