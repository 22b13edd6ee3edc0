//! In-memory storage backend for testing.

use super::{BoxSyncRead, BoxSyncWrite, ByteStream, FileInfoStream};
use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::file::FileInfo;
use crate::path::validate as validate_path;
use async_stream::stream;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use time::OffsetDateTime;

type Files = Arc<RwLock<HashMap<PathBuf, (OffsetDateTime, Vec<u8>)>>>;

/// In-memory storage backend for testing.
///
/// Files live in a `HashMap` behind a shared [`RwLock`]. The lock is a
/// synchronous one so that [`writer()`](StorageBackend::writer) handles can
/// commit from inside `spawn_blocking`; it is never held across an await.
///
/// Objects aren't on any filesystem, so [`resolve()`](StorageBackend::resolve)
/// always fails with [`Unaddressable`](ErrorKind::Unaddressable).
///
/// # Examples
///
/// ```
/// use pressroom_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([("uploads/a.pdf", b"%PDF")]);
/// assert!(backend.exists(Path::new("uploads/a.pdf")).await?);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: Files,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path fails validation. If test setup is wrong, then the
    /// test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        let now = OffsetDateTime::now_utc();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            map.insert(validated, (now, data.into()));
        }
        Self {
            name: "mock".to_string(),
            storage: Arc::new(RwLock::new(map)),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Number of files currently stored.
    pub fn len(&self) -> usize {
        self.storage.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, path: &Path) -> Result<(OffsetDateTime, Vec<u8>)> {
        let path = validate_path(path)?;
        let guard = self.storage.read().unwrap_or_else(PoisonError::into_inner);
        guard.get(&path).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

/// Buffers everything written and commits it to the map on `flush()`.
struct MockWriter {
    path: PathBuf,
    buffer: Vec<u8>,
    storage: Files,
}
impl Write for MockWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut guard = self.storage.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(self.path.clone(), (OffsetDateTime::now_utc(), self.buffer.clone()));
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let validated_prefix = match prefix.map(validate_path).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };
        // Snapshot matching entries before yielding anything.
        let entries: Vec<FileInfo> = {
            let guard = self.storage.read().unwrap_or_else(PoisonError::into_inner);
            guard
                .iter()
                .filter(|(path, _)| validated_prefix.as_ref().is_none_or(|pfx| path.starts_with(pfx)))
                .map(|(path, (inserted, data))| FileInfo::new(path.clone(), data.len() as u64, *inserted))
                .collect()
        };
        Box::pin(stream! {
            for info in entries {
                yield Ok(info);
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        Ok(self.storage.read().unwrap_or_else(PoisonError::into_inner).contains_key(&path))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(self.get(path)?.1)
    }

    async fn reader(&self, path: &Path) -> Result<BoxSyncRead> {
        Ok(Box::new(Cursor::new(self.get(path)?.1)))
    }

    async fn stream(&self, path: &Path) -> Result<ByteStream> {
        let data = Bytes::from(self.get(path)?.1);
        Ok(Box::pin(futures::stream::once(async move { Ok(data) })))
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = validate_path(path)?;
        let mut guard = self.storage.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(path, (OffsetDateTime::now_utc(), data.to_vec()));
        Ok(())
    }

    async fn writer(&self, path: &Path) -> Result<BoxSyncWrite> {
        let path = validate_path(path)?;
        Ok(Box::new(MockWriter {
            path,
            buffer: Vec::new(),
            storage: Arc::clone(&self.storage),
        }))
    }

    async fn delete(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        Ok(self.storage.write().unwrap_or_else(PoisonError::into_inner).remove(&path).is_some())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from = validate_path(from)?;
        let to = validate_path(to)?;
        let mut guard = self.storage.write().unwrap_or_else(PoisonError::into_inner);
        let data = guard.remove(&from).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(from)))?;
        guard.insert(to, data);
        Ok(())
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let (inserted, data) = self.get(path)?;
        Ok(FileInfo::new(validate_path(path)?, data.len() as u64, inserted))
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        exn::bail!(ErrorKind::Unaddressable(path.to_path_buf()))
    }
}
