use crate::error::{ErrorKind, Result};
use crate::method::{Method, Packaging};
use exn::ResultExt;
use pressroom_storage::backend::BoxSyncRead;
use pressroom_storage::{Area, Location, Scratch};
use std::collections::HashSet;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write, copy};
use std::path::Path;
use tokio::task::spawn_blocking;
use tracing::instrument;
use zip::ZipWriter;
use zip::write::FileOptions;

pub const DEFAULT_ARCHIVE_NAME: &str = "compressed_pdfs.zip";
const PARTIAL_SUFFIX: &str = ".partial";

/// A file to include in the artifact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    /// Name inside the container, or the download name when delivered bare.
    pub name: String,
    pub location: Location,
}
impl Member {
    pub fn new(name: impl Into<String>, location: Location) -> Self {
        Self { name: name.into(), location }
    }
}

/// A finished artifact sitting in the [`Artifact`](Area::Artifact) area.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Package {
    pub location: Location,
    /// Name the client should save it as.
    pub filename: String,
    pub content_type: &'static str,
    pub size: u64,
    pub members: usize,
}

/// Builds one [`Package`] out of the successful outputs of a batch.
///
/// The container is spooled to an anonymous temporary file, copied into a
/// `.partial` location and only then renamed to its final location, so a
/// [`Package`] is never handed out for a half-written file. Member files are
/// consumed: they are deleted whether or not the build succeeds.
#[derive(Clone)]
pub struct Assembler {
    scratch: Scratch,
    method: Method,
    name: String,
    packaging: Packaging,
}
impl Assembler {
    pub fn new(scratch: Scratch) -> Self {
        Self {
            scratch,
            method: Method::default(),
            name: DEFAULT_ARCHIVE_NAME.to_string(),
            packaging: Packaging::default(),
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Download name of the container.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_packaging(mut self, packaging: Packaging) -> Self {
        self.packaging = packaging;
        self
    }

    #[instrument(skip_all, fields(members = members.len(), method = %self.method))]
    pub async fn build(&self, members: Vec<Member>) -> Result<Package> {
        let result = match (members.as_slice(), self.packaging) {
            ([], _) => Err(exn::Exn::from(ErrorKind::Empty)),
            ([only], Packaging::Bare) => self.promote(only).await,
            _ => self.archive(&members).await,
        };
        for member in &members {
            self.scratch.discard(&member.location).await;
        }
        match &result {
            Ok(package) => tracing::info!(artifact = %package.location, bytes = package.size, "Built artifact"),
            Err(e) => tracing::error!(error = ?e, "Failed to build artifact"),
        }
        result
    }

    /// Deliver a single member as is.
    async fn promote(&self, member: &Member) -> Result<Package> {
        let target = self.scratch.allocate(Area::Artifact, &member.name);
        let backend = self.scratch.backend();
        backend.rename(member.location.path(), target.path()).await.or_raise(|| ErrorKind::Publish)?;
        let size = match backend.stat(target.path()).await {
            Ok(info) => info.size,
            Err(e) => {
                self.scratch.discard(&target).await;
                return Err(e.raise(ErrorKind::Publish));
            },
        };
        Ok(Package {
            location: target,
            filename: member.name.clone(),
            content_type: content_type(&member.name),
            size,
            members: 1,
        })
    }

    async fn archive(&self, members: &[Member]) -> Result<Package> {
        let target = self.scratch.allocate(Area::Artifact, &self.name);
        let partial = target.with_suffix(PARTIAL_SUFFIX);
        match self.write_archive(members, &partial, &target).await {
            Ok(size) => Ok(Package {
                location: target,
                filename: self.name.clone(),
                content_type: content_type(&self.name),
                size,
                members: members.len(),
            }),
            Err(e) => {
                self.scratch.discard(&partial).await;
                self.scratch.discard(&target).await;
                Err(e)
            },
        }
    }

    async fn write_archive(&self, members: &[Member], partial: &Location, target: &Location) -> Result<u64> {
        let backend = self.scratch.backend();
        let mut sources: Vec<(String, BoxSyncRead)> = Vec::with_capacity(members.len());
        for (name, member) in unique_names(members.iter().map(|m| m.name.as_str())).into_iter().zip(members) {
            let reader = backend
                .reader(member.location.path())
                .await
                .or_raise(|| ErrorKind::Member(member.name.clone()))?;
            sources.push((name, reader));
        }

        let method = self.method;
        let mut spooled = spawn_blocking(move || spool(method, sources)).await.or_raise(|| ErrorKind::Write)??;

        let mut writer = backend.writer(partial.path()).await.or_raise(|| ErrorKind::Write)?;
        let size = spawn_blocking(move || -> std::io::Result<u64> {
            let size = copy(&mut spooled, &mut writer)?;
            writer.flush()?;
            Ok(size)
        })
        .await
        .or_raise(|| ErrorKind::Write)?
        .or_raise(|| ErrorKind::Write)?;

        backend.rename(partial.path(), target.path()).await.or_raise(|| ErrorKind::Publish)?;
        Ok(size)
    }
}

/// Write every source into a zip container held in an anonymous temp file,
/// rewound and ready to be copied out.
fn spool(method: Method, sources: Vec<(String, BoxSyncRead)>) -> Result<File> {
    let file = tempfile::tempfile().or_raise(|| ErrorKind::Write)?;
    let mut zip = ZipWriter::new(file);
    let options: FileOptions<'_, ()> = FileOptions::default()
        .compression_method(method.zip_method())
        .unix_permissions(0o644);
    for (name, mut reader) in sources {
        tracing::trace!(member = %name, "Adding archive member");
        zip.start_file(name.as_str(), options).or_raise(|| ErrorKind::Member(name.clone()))?;
        copy(&mut reader, &mut zip).or_raise(|| ErrorKind::Member(name.clone()))?;
    }
    let mut file = zip.finish().or_raise(|| ErrorKind::Write)?;
    file.seek(SeekFrom::Start(0)).or_raise(|| ErrorKind::Write)?;
    Ok(file)
}

/// Rename repeated names to `name (2).ext`, `name (3).ext` and so on, in
/// order of appearance.
fn unique_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .map(|name| {
            if seen.insert(name.to_string()) {
                return name.to_string();
            }
            let path = Path::new(name);
            let (stem, ext) = match (path.file_stem(), path.extension()) {
                (Some(stem), Some(ext)) => (stem.to_string_lossy(), format!(".{}", ext.to_string_lossy())),
                _ => (name.into(), String::new()),
            };
            let unique = (2..)
                .map(|n| format!("{stem} ({n}){ext}"))
                .find(|candidate| !seen.contains(candidate))
                .unwrap_or_default();
            seen.insert(unique.clone());
            unique
        })
        .collect()
}

fn content_type(filename: &str) -> &'static str {
    match Path::new(filename).extension().and_then(|e| e.to_str()).map(str::to_lowercase).as_deref() {
        Some("zip") => "application/zip",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}
