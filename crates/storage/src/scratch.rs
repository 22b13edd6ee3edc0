//! Scratch space for transient batch files.
//!
//! [`Scratch`] hands out collision-free [`Location`]s for uploads, tool
//! outputs and finished artifacts, and deletes them again. Deletion is
//! idempotent so cleanup code can run on every exit path.

use crate::BackendHandle;
use crate::error::Result;
use futures::TryStreamExt;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Longest sanitized name kept in a location, in bytes.
const MAX_NAME_LEN: usize = 96;

/// The kind of file a location holds. Each kind lives in its own directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Area {
    /// Files received from a client, awaiting transformation.
    Upload,
    /// Files written by the external tool.
    Output,
    /// Finished deliverables awaiting download.
    Artifact,
}
impl Area {
    pub fn dir(&self) -> &'static str {
        match self {
            Area::Upload => "uploads",
            Area::Output => "outputs",
            Area::Artifact => "artifacts",
        }
    }
}

/// A storage path handed out by [`Scratch::allocate`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Location(PathBuf);
impl Location {
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// A sibling location with `suffix` appended to the file name.
    pub fn with_suffix(&self, suffix: &str) -> Location {
        let mut name = self.0.as_os_str().to_os_string();
        name.push(suffix);
        Location(PathBuf::from(name))
    }
}
impl AsRef<Path> for Location {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}
impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0.display())
    }
}

/// Temporary storage manager.
#[derive(Clone)]
pub struct Scratch {
    backend: BackendHandle,
}
impl Scratch {
    pub fn new(backend: BackendHandle) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }

    /// Allocate a fresh location for `logical_name`.
    ///
    /// The location keeps a sanitized copy of the name (so the extension
    /// survives for external tools) behind a random prefix, so two uploads
    /// with the same name never share a location. Nothing is written.
    ///
    /// ```
    /// # use std::sync::Arc;
    /// use pressroom_storage::{Scratch, scratch::Area, backend::LocalBackend};
    /// # let dir = tempfile::tempdir().unwrap();
    /// let scratch = Scratch::new(Arc::new(LocalBackend::new("scratch", dir.path()).unwrap()));
    /// let first = scratch.allocate(Area::Upload, "report.pdf");
    /// let second = scratch.allocate(Area::Upload, "report.pdf");
    /// assert_ne!(first, second);
    /// assert!(first.to_string().ends_with("-report.pdf"));
    /// ```
    pub fn allocate(&self, area: Area, logical_name: &str) -> Location {
        let id = Uuid::new_v4().simple();
        Location(Path::new(area.dir()).join(format!("{id}-{}", sanitize(logical_name))))
    }

    /// Delete the object at `location` if present.
    ///
    /// Returns `true` if something was removed.
    pub async fn delete(&self, location: &Location) -> Result<bool> {
        self.backend.delete(location.path()).await
    }

    /// Best-effort [`delete()`](Self::delete) for cleanup paths: failures are
    /// logged, never returned.
    pub async fn discard(&self, location: &Location) {
        if let Err(e) = self.delete(location).await {
            tracing::warn!(location = %location, error = ?e, "Failed to delete transient file");
        }
    }

    /// Filesystem path of `location` for an external process.
    pub fn resolve(&self, location: &Location) -> Result<PathBuf> {
        self.backend.resolve(location.path())
    }

    /// Delete every file in every area; returns how many were removed.
    ///
    /// Nothing survives a restart, so anything found at startup is residue
    /// from a previous process.
    pub async fn purge(&self) -> Result<usize> {
        let mut removed = 0;
        for area in [Area::Upload, Area::Output, Area::Artifact] {
            let files: Vec<_> = self.backend.list_stream(Some(Path::new(area.dir()))).try_collect().await?;
            for file in files {
                if self.backend.delete(&file.path).await? {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    /// Count files currently held in `area`.
    pub async fn count(&self, area: Area) -> Result<usize> {
        Ok(self.backend.list(Some(Path::new(area.dir()))).await?.len())
    }
}

/// Reduce an untrusted upload name to a single safe path component.
pub fn sanitize(logical_name: &str) -> String {
    let base = logical_name.rsplit(['/', '\\']).next().unwrap_or_default();
    let mut clean: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let leading_dots = clean.len() - clean.trim_start_matches('.').len();
    clean.replace_range(..leading_dots, "");
    if clean.len() > MAX_NAME_LEN {
        // Keep the tail so the extension survives. Every char is ASCII by now.
        let excess = clean.len() - MAX_NAME_LEN;
        clean.replace_range(..excess, "");
    }
    match clean.is_empty() {
        true => "file".to_string(),
        false => clean,
    }
}
