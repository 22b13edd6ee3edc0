//! Batch PDF compression with single-use downloads.
//!
//! Uploaded PDFs are compressed through Ghostscript, the successes packed
//! into one archive and that archive handed out exactly once. Every file
//! the service writes lives in scratch storage and is removed as soon as
//! it is no longer needed.

pub mod cli;
pub mod error;
pub mod http;
pub mod logging;
pub mod pipeline;
pub mod qr;

pub use self::error::{Error, ErrorKind, Result};
pub use self::pipeline::{Pipeline, Processed};
