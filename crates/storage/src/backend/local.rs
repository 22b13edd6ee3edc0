//! Local filesystem storage backend.
//!
//! Files are stored in a configured directory and accessed via `tokio::fs`.
//! This is the only backend whose objects an external tool can open
//! directly, see [`StorageBackend::resolve`].

use crate::backend::{BoxSyncRead, BoxSyncWrite, ByteStream, FileInfoStream};
use crate::error::ErrorKind;
use crate::{FileInfo, StorageBackend, error::Result, path::validate as validate_path};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use std::fs::{Metadata, create_dir_all as sync_create_dir};
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};
use tokio_util::io::ReaderStream;

enum WalkEntry {
    File(FileInfo),
    Descend(PathBuf),
    Skip,
}

/// Local filesystem storage backend.
///
/// # Examples
///
/// ```no_run
/// use pressroom_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("scratch", "/var/tmp/pressroom")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Root directory holding every transient file
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend, creating `root` if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute or exists but isn't a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Only happens once at startup, not worth making the constructor async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }
        Ok(Self { name: name.into(), root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validates the path and joins it with the root directory.
    fn absolute_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(path.as_ref())?;
        Ok(self.root.join(validated))
    }

    /// Strips the root prefix from an absolute path.
    fn relative_path(&self, absolute: impl AsRef<Path>) -> Result<PathBuf> {
        let absolute = absolute.as_ref();
        let relative = absolute.strip_prefix(&self.root).or_raise(|| {
            ErrorKind::BackendError(format!("path `{:?}` is not within root `{:?}`", absolute, self.root))
        })?;
        validate_path(relative)
    }

    fn metadata(path: &Path, metadata: Metadata) -> Result<FileInfo> {
        let modified = metadata.modified().map_err(ErrorKind::Io)?;
        Ok(FileInfo::new(path, metadata.len(), modified))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    async fn create_parent(&self, abs_path: &Path, path: &Path) -> Result<()> {
        if let Some(parent) = abs_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, path))?;
        }
        Ok(())
    }

    /// Pulled out of the stream loop, where `?` isn't available.
    async fn process_entry(&self, entry: DirEntry, prefix: Option<&Path>) -> Result<WalkEntry> {
        let path = entry.path();
        let metadata = entry.metadata().await.map_err(|e| Self::map_io_error(e, &path))?;
        let relative = self.relative_path(&path)?;
        if let Some(pfx) = prefix
            && !relative.starts_with(pfx)
            && !pfx.starts_with(&relative)
        {
            return Ok(WalkEntry::Skip);
        }
        if metadata.is_dir() {
            return Ok(WalkEntry::Descend(path));
        }
        if metadata.is_file() && prefix.is_none_or(|pfx| relative.starts_with(pfx)) {
            return Ok(WalkEntry::File(Self::metadata(&relative, metadata)?));
        }
        Ok(WalkEntry::Skip)
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let validated_prefix = match prefix.map(validate_path).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Result::Err(e) })),
        };
        let mut stack = vec![self.root.clone()];

        Box::pin(stream! {
            'dirs: while let Some(current) = stack.pop() {
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    // A directory removed mid-walk is just an empty listing.
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(err) => {
                        yield Err(exn::Exn::from(Self::map_io_error(err, &current)));
                        continue 'dirs;
                    }
                };
                'entries: loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break 'entries,
                        Err(e) => { yield Err(exn::Exn::from(Self::map_io_error(e, &current))); continue 'entries; },
                    };
                    match self.process_entry(entry, validated_prefix.as_deref()).await {
                        Ok(WalkEntry::File(f)) => yield Ok(f),
                        Ok(WalkEntry::Descend(d)) => stack.push(d),
                        Ok(WalkEntry::Skip) => {},
                        Err(e) => yield Err(e),
                    };
                }
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::try_exists(&abs_path).await.map_err(ErrorKind::Io)?)
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::read(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn reader(&self, path: &Path) -> Result<BoxSyncRead> {
        let abs_path = self.absolute_path(path)?;
        let file = fs::File::open(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?;
        Ok(Box::new(file.into_std().await))
    }

    async fn stream(&self, path: &Path) -> Result<ByteStream> {
        let abs_path = self.absolute_path(path)?;
        let file = fs::File::open(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?;
        Ok(Box::pin(ReaderStream::new(file)))
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        self.create_parent(&abs_path, path).await?;
        Ok(fs::write(&abs_path, data).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn writer(&self, path: &Path) -> Result<BoxSyncWrite> {
        let abs_path = self.absolute_path(path)?;
        self.create_parent(&abs_path, path).await?;
        let file = fs::File::create(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?;
        Ok(Box::new(file.into_std().await))
    }

    async fn delete(&self, path: &Path) -> Result<bool> {
        let abs_path = self.absolute_path(path)?;
        match fs::remove_file(&abs_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Self::map_io_error(e, path).into()),
        }
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from_path = self.absolute_path(from)?;
        let to_path = self.absolute_path(to)?;
        self.create_parent(&to_path, to).await?;
        Ok(fs::rename(&from_path, &to_path).await.map_err(|e| Self::map_io_error(e, from))?)
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let abs_path = self.absolute_path(path)?;
        let metadata = fs::metadata(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?;
        Self::metadata(path, metadata)
    }

    /// Parent directories are created so a process can write straight to the
    /// returned path.
    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        let abs_path = self.absolute_path(path)?;
        if let Some(parent) = abs_path.parent() {
            sync_create_dir(parent).map_err(|e| Self::map_io_error(e, path))?;
        }
        Ok(abs_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use std::io::{Read, Write};

    fn backend() -> (tempfile::TempDir, LocalBackend) {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("scratch", temp_dir.path()).unwrap();
        (temp_dir, backend)
    }

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalBackend::new("scratch", temp_dir.path()).is_ok());
        assert!(LocalBackend::new("scratch", "relative/path").is_err());
    }

    #[test]
    fn test_new_creates_missing_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("nested/root");
        LocalBackend::new("scratch", &root).unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn test_resolve() {
        let (temp_dir, backend) = backend();
        assert_eq!(backend.resolve(Path::new("a/b.pdf")).unwrap(), temp_dir.path().join("a/b.pdf"));
        assert!(temp_dir.path().join("a").is_dir());
        assert!(backend.resolve(Path::new("../escape.pdf")).is_err());
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let (_dir, backend) = backend();
        backend.write(Path::new("dir/test.pdf"), b"%PDF-1.4").await.unwrap();
        assert_eq!(backend.read(Path::new("dir/test.pdf")).await.unwrap(), b"%PDF-1.4");
    }

    #[tokio::test]
    async fn test_reader_and_writer() {
        let (_dir, backend) = backend();
        let mut writer = backend.writer(Path::new("out.bin")).await.unwrap();
        tokio::task::spawn_blocking(move || {
            writer.write_all(b"streamed").unwrap();
            writer.flush().unwrap();
        })
        .await
        .unwrap();
        let mut reader = backend.reader(Path::new("out.bin")).await.unwrap();
        let contents = tokio::task::spawn_blocking(move || {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf).unwrap();
            buf
        })
        .await
        .unwrap();
        assert_eq!(contents, b"streamed");
    }

    #[tokio::test]
    async fn test_stream() {
        let (_dir, backend) = backend();
        backend.write(Path::new("file.pdf"), b"0123456789").await.unwrap();
        let chunks: Vec<_> = backend.stream(Path::new("file.pdf")).await.unwrap().try_collect().await.unwrap();
        assert_eq!(chunks.concat(), b"0123456789");
        let err = backend.stream(Path::new("missing.pdf")).await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_dir, backend) = backend();
        backend.write(Path::new("file.pdf"), b"data").await.unwrap();
        assert!(backend.delete(Path::new("file.pdf")).await.unwrap());
        assert!(!backend.exists(Path::new("file.pdf")).await.unwrap());
        assert!(!backend.delete(Path::new("file.pdf")).await.unwrap());
        assert!(!backend.delete(Path::new("never-existed.pdf")).await.unwrap());
    }

    #[tokio::test]
    async fn test_rename() {
        let (_dir, backend) = backend();
        backend.write(Path::new("old.zip.partial"), b"data").await.unwrap();
        backend.rename(Path::new("old.zip.partial"), Path::new("new.zip")).await.unwrap();
        assert!(!backend.exists(Path::new("old.zip.partial")).await.unwrap());
        assert_eq!(backend.read(Path::new("new.zip")).await.unwrap(), b"data");
        let err = backend.rename(Path::new("missing"), Path::new("other")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_stat() {
        let (_dir, backend) = backend();
        backend.write(Path::new("file.pdf"), b"Hello, world!").await.unwrap();
        let info = backend.stat(Path::new("file.pdf")).await.unwrap();
        assert_eq!(info.path, PathBuf::from("file.pdf"));
        assert_eq!(info.size, 13);
    }

    #[tokio::test]
    async fn test_list() {
        let (_dir, backend) = backend();
        assert!(backend.list(None).await.unwrap().is_empty());
        backend.write(Path::new("uploads/a.pdf"), b"a").await.unwrap();
        backend.write(Path::new("uploads/b.pdf"), b"b").await.unwrap();
        backend.write(Path::new("artifacts/c.zip"), b"c").await.unwrap();
        assert_eq!(backend.list(None).await.unwrap().len(), 3);
        let uploads = backend.list(Some(Path::new("uploads"))).await.unwrap();
        assert_eq!(uploads.len(), 2);
        assert!(uploads.iter().all(|f| f.path.starts_with("uploads")));
        assert!(backend.list(Some(Path::new("nonexistent"))).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_path_security() {
        let (_dir, backend) = backend();
        assert!(backend.read(Path::new("../etc/passwd")).await.is_err());
        assert!(backend.write(Path::new("../etc/passwd"), b"data").await.is_err());
        assert!(backend.delete(Path::new("../../file")).await.is_err());
    }
}
