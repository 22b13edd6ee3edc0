//! Per-file transformation through an external tool.
//!
//! A [`Runner`] takes one [`UploadedFile`] out of scratch storage, hands its
//! path to a [`Transformer`] (normally [`Ghostscript`]) and reports a
//! [`TransformOutcome`]. The runner never fails: every problem becomes a
//! [`Failure`] with a short cause, and the upload is deleted either way.

pub mod error;
mod outcome;
mod preset;
mod runner;
mod tool;
mod transformer;

pub use crate::outcome::{Failure, Success, TransformOutcome, UploadedFile, display_name};
pub use crate::preset::Preset;
pub use crate::runner::{DEFAULT_OUTPUT_PREFIX, DEFAULT_TIMEOUT, Runner};
pub use crate::tool::Tool;
pub use crate::transformer::{CustomCommand, Ghostscript, Transformer};
