//! Archive Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// An archive error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Nothing to package.
    #[display("no files to package")]
    Empty,
    /// A member's content could not be read or added to the container.
    #[display("failed to add {_0} to the archive")]
    Member(#[error(not(source))] String),
    /// The container could not be written or finalized.
    #[display("failed to write the archive")]
    Write,
    /// The finished artifact could not be moved into place.
    #[display("failed to publish the archive")]
    Publish,
    #[display("unsupported archive method: {_0}")]
    UnsupportedMethod(#[error(not(source))] String),
    /// Method exists but the feature flag is not enabled.
    #[display("archive method {_0} requires a feature flag that is not enabled")]
    DisabledMethod(#[error(not(source))] String),
    #[display("unknown single-file packaging: {_0}")]
    UnknownPackaging(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Write | Self::Publish)
    }
}
