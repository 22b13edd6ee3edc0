//! Service Error Types
//!
//! Library crates report their own kinds; these are the categories the
//! service acts on, each mapped to one client response in
//! [`http::error`](crate::http::error).

use derive_more::{Display, Error};
use std::net::SocketAddr;

/// A service error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The request carried no files.
    #[display("no files uploaded")]
    NoFiles,
    /// The multipart body could not be read.
    #[display("invalid upload: {_0}")]
    Intake(#[error(not(source))] String),
    /// Every file of the batch failed to transform.
    #[display("all {_0} files failed")]
    AllFailed(#[error(not(source))] usize),
    #[display("batch did not complete")]
    Batch,
    #[display("failed to build the archive")]
    Archive,
    #[display("scratch storage error")]
    Storage,
    #[display("artifact not found")]
    NotFound,
    #[display("failed to read the artifact")]
    Delivery,
    #[display("external tool unavailable")]
    Tool,
    #[display("failed to generate QR code")]
    Qr,
    #[display("invalid configuration")]
    Config,
    #[display("failed to bind {_0}")]
    Bind(#[error(not(source))] SocketAddr),
    #[display("server error")]
    Server,
    #[display("failed to write {_0}")]
    Output(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage | Self::Archive | Self::Delivery)
    }
}
