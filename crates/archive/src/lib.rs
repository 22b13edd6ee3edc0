//! Packaging of a finished batch into one downloadable artifact.
//!
//! The [`Assembler`] turns the outputs of a batch into a single zip container
//! (or, with [`Packaging::Bare`], hands back a lone output as is). Members are
//! compressed with the configured [`Method`]; `bzip2` and `zstd` are behind
//! feature flags of the same name.

mod assembler;
pub mod error;
mod method;

pub use crate::assembler::{Assembler, DEFAULT_ARCHIVE_NAME, Member, Package};
pub use crate::method::{Method, Packaging};
