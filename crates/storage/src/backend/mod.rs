//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait: the unified interface the
//! scratch allocator, the archive assembler and the delivery controller use to
//! touch transient files, whatever actually holds them.

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
use crate::error::Result;
use crate::file::FileInfo;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;

pub(crate) type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;
/// Chunked file contents, suitable for an HTTP response body.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + 'static>>;
pub type BoxSyncRead = Box<dyn Read + Send + 'static>;
pub type BoxSyncWrite = Box<dyn Write + Send + 'static>;

/// Unified interface for storage backends.
///
/// # Path Handling
/// All paths are relative to the storage root and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations
/// enforce this validation.
///
/// # Deletion
/// [`delete()`](Self::delete) is idempotent: deleting a path that doesn't
/// exist succeeds and reports `false`. Cleanup code calls it speculatively on
/// every exit path without checking for existence first.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use pressroom_storage::{backend::StorageBackend, error::Result};
///
/// async fn discard(backend: &dyn StorageBackend, path: &Path) -> Result<()> {
///     backend.delete(path).await?;
///     // Second call is a no-op.
///     assert!(!backend.delete(path).await?);
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// List all files matching an optional prefix.
    ///
    /// Default implementation collects [`list_stream()`](Self::list_stream)
    /// into a [`Vec`].
    async fn list(&self, prefix: Option<&Path>) -> Result<Vec<FileInfo>> {
        self.list_stream(prefix).try_collect().await
    }

    /// Stream file metadata matching an optional prefix.
    ///
    /// Listing a prefix that doesn't exist yields an empty stream, not an
    /// error.
    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a>;

    /// Check if a file exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read file contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Open a file for streaming reads.
    ///
    /// Returns a `'static` boxed [`Read`] suitable for use inside
    /// [`spawn_blocking`](tokio::task::spawn_blocking). The async setup
    /// (opening the file) happens before returning.
    async fn reader(&self, path: &Path) -> Result<BoxSyncRead>;

    /// Open a file as an asynchronous stream of chunks.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist; I/O errors after that point surface as stream items.
    async fn stream(&self, path: &Path) -> Result<ByteStream>;

    /// Write file contents, creating or overwriting.
    ///
    /// Implementations create parent directories as needed.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Open a file for streaming writes.
    ///
    /// Returns a `'static` boxed [`Write`] suitable for use inside
    /// [`spawn_blocking`](tokio::task::spawn_blocking).
    ///
    /// # Notes
    /// - Callers must call `flush()` before dropping to ensure data is
    ///   written and errors are propagated. Some backends buffer all data
    ///   and only commit on `flush()`.
    async fn writer(&self, path: &Path) -> Result<BoxSyncWrite>;

    /// Delete a file if present.
    ///
    /// Returns `true` if a file was removed, `false` if there was nothing to
    /// remove.
    async fn delete(&self, path: &Path) -> Result<bool>;

    /// Rename/move a file within the same backend, overwriting the
    /// destination.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the source
    /// file does not exist.
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Get file metadata without reading contents.
    async fn stat(&self, path: &Path) -> Result<FileInfo>;

    /// Absolute filesystem path of a storage path, for handing to an
    /// external process.
    ///
    /// Backends that don't keep objects on the local filesystem return
    /// [`Unaddressable`](crate::error::ErrorKind::Unaddressable).
    fn resolve(&self, path: &Path) -> Result<PathBuf>;
}
