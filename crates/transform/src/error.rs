//! Transform Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. None of these ever escape
//! [`Runner::run`](crate::Runner::run); they are folded into a
//! [`Failure`](crate::Failure) cause instead.

use derive_more::{Display, Error};
use std::fmt::{Display as FmtDisplay, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::time::Duration;

/// A transform error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for transform operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("ghostscript not detected on your system")]
    ToolNotFound,
    #[display("no executable at {}", _0.display())]
    ToolMissing(#[error(not(source))] PathBuf),
    /// The process could not be spawned at all.
    #[display("failed to launch {_0}")]
    Launch(#[error(not(source))] String),
    #[display("timed out after {_0:?}")]
    Timeout(#[error(not(source))] Duration),
    /// The tool ran and reported failure.
    #[display("tool {_0}")]
    Failed(#[error(not(source))] ExitReport),
    /// The tool reported success but left nothing at the output path.
    #[display("tool produced no output")]
    EmptyOutput,
    /// Scratch storage could not provide a path for the tool.
    #[display("scratch storage unavailable")]
    Storage,
    #[display("unknown preset: {_0}")]
    UnknownPreset(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Informational only; the runner makes a single attempt per file.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Launch(_))
    }
}

/// How a failed tool process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitReport {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
    /// Last non-empty line of stderr, truncated.
    pub stderr: String,
}
impl FmtDisplay for ExitReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.code {
            Some(code) => write!(f, "exited with code {code}")?,
            None => write!(f, "was terminated by a signal")?,
        }
        match self.stderr.is_empty() {
            true => Ok(()),
            false => write!(f, ": {}", self.stderr),
        }
    }
}
