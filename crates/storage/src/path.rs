//! Path validation.
//!
//! Every storage path is relative to the backend root; uploads carry
//! client-controlled names, so nothing may resolve outside that root.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates and normalizes a storage path.
///
/// `.` components and duplicate separators are dropped, `..` is resolved
/// lexically and rejected when it would climb above the root. Null bytes and
/// Windows prefixes are rejected outright.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use pressroom_storage::validate_path;
/// assert!(validate_path("uploads/report.pdf").is_ok());
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("a\0b").is_err());
/// assert_eq!(validate_path("x/../y//./z.pdf/").unwrap(), Path::new("y/z.pdf"));
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    let mut components = Vec::new();
    for component in original.components() {
        match component {
            Component::Normal(s) => {
                // Null bytes survive Path::components() on Unix but truncate
                // the path once it reaches a syscall.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(original.to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(original.to_path_buf())),
        false => Ok(components.into_iter().collect()),
    }
}
