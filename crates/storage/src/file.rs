use std::path::PathBuf;
use time::OffsetDateTime;

/// File metadata returned by storage backends.
///
/// Used by listing (residual sweeps) and by intake, which reports the byte
/// size of every uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Relative path from storage root
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub modified: OffsetDateTime,
}
impl FileInfo {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: impl Into<OffsetDateTime>) -> Self {
        Self {
            path: path.into(),
            size,
            modified: modified.into(),
        }
    }
}
