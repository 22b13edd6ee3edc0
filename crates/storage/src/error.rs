//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// File does not exist
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Access denied
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Path contains invalid characters or escapes root
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// The backend keeps its objects somewhere an external process can't
    /// reach (in memory, remote object store).
    #[display("no filesystem path for: {}", _0.display())]
    Unaddressable(#[error(not(source))] PathBuf),
    /// Backend-specific error
    #[display("backend error: {_0}")]
    BackendError(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::BackendError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::NotFound(PathBuf::from("a.pdf")).to_string(), "file not found: a.pdf");
        assert_eq!(ErrorKind::Unaddressable(PathBuf::from("b.pdf")).to_string(), "no filesystem path for: b.pdf");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(!ErrorKind::NotFound(PathBuf::from("a.pdf")).is_retryable());
        assert!(!ErrorKind::InvalidPath(PathBuf::from("../a.pdf")).is_retryable());
        assert!(ErrorKind::BackendError("flaky".to_string()).is_retryable());
    }
}
