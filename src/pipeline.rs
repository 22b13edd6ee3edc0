//! The batch pipeline: intake, transform, package, deliver.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use pressroom_archive::{Assembler, Member};
use pressroom_batch::{BatchResult, Coordinator, default_concurrency};
use pressroom_config::Config;
use pressroom_delivery::error::ErrorKind as DeliveryErrorKind;
use pressroom_delivery::{ArtifactId, Delivery, Download, Preview};
use pressroom_storage::backend::LocalBackend;
use pressroom_storage::{Area, Scratch};
use pressroom_transform::{Ghostscript, Runner, Tool, Transformer, UploadedFile};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::instrument;

/// A batch that produced an artifact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Processed {
    pub id: ArtifactId,
    /// Files packed into the artifact.
    pub file_count: usize,
    pub failed: usize,
}

/// Everything one request needs, shared by all requests.
pub struct Pipeline {
    scratch: Scratch,
    coordinator: Coordinator,
    assembler: Assembler,
    delivery: Arc<Delivery>,
}
impl Pipeline {
    pub fn new(scratch: Scratch, transformer: Arc<dyn Transformer>, config: &Config) -> Self {
        let runner = Runner::new(scratch.clone(), transformer)
            .with_timeout(config.transform.timeout())
            .with_output_prefix(config.transform.output_prefix.clone());
        let coordinator = Coordinator::new(runner)
            .with_max_concurrency(config.batch.max_concurrency().unwrap_or_else(default_concurrency));
        let assembler = Assembler::new(scratch.clone())
            .with_method(config.archive.method)
            .with_name(config.archive.name.clone())
            .with_packaging(config.archive.single_file);
        let delivery = Arc::new(Delivery::new(scratch.clone()).with_ttl(config.delivery.ttl()));
        Self { scratch, coordinator, assembler, delivery }
    }

    /// Open scratch storage, clear what a previous process left behind and
    /// locate Ghostscript.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let backend = LocalBackend::new("scratch", &config.storage.root).or_raise(|| ErrorKind::Storage)?;
        let scratch = Scratch::new(Arc::new(backend));
        let purged = scratch.purge().await.or_raise(|| ErrorKind::Storage)?;
        if purged > 0 {
            tracing::info!(purged, root = %config.storage.root.display(), "Removed files left by a previous run");
        }
        let tool = Tool::locate(config.transform.program.as_deref()).or_raise(|| ErrorKind::Tool)?;
        tracing::info!(tool = %tool.path().display(), preset = %config.transform.preset, "Using Ghostscript");
        let ghostscript = Ghostscript::new(tool)
            .with_preset(config.transform.preset)
            .with_compatibility(config.transform.compatibility.clone());
        Ok(Self::new(scratch, Arc::new(ghostscript), config))
    }

    pub fn scratch(&self) -> &Scratch {
        &self.scratch
    }

    pub fn delivery(&self) -> &Arc<Delivery> {
        &self.delivery
    }

    /// Start receiving the files of one request.
    pub fn uploads(&self) -> Uploads {
        Uploads { scratch: self.scratch.clone(), files: Vec::new() }
    }

    /// Transform `files` and package the successes as a downloadable artifact.
    #[instrument(skip_all, fields(files = files.len()))]
    pub async fn process(&self, files: Vec<UploadedFile>) -> Result<Processed> {
        if files.is_empty() {
            exn::bail!(ErrorKind::NoFiles);
        }
        let (successes, failures) = match self.coordinator.run(files).await.or_raise(|| ErrorKind::Batch)? {
            BatchResult::Empty => exn::bail!(ErrorKind::NoFiles),
            BatchResult::AllFailed { failures } => {
                for failure in &failures {
                    tracing::warn!(file = %failure.source_name, cause = %failure.cause, "File failed");
                }
                exn::bail!(ErrorKind::AllFailed(failures.len()));
            },
            BatchResult::Succeeded { successes, failures } => (successes, failures),
        };
        for failure in &failures {
            tracing::warn!(file = %failure.source_name, cause = %failure.cause, "File left out of the artifact");
        }
        let members = successes.into_iter().map(|s| Member::new(s.display_name, s.output)).collect();
        let package = self.assembler.build(members).await.or_raise(|| ErrorKind::Archive)?;
        let file_count = package.members;
        let id = self.delivery.register(package);
        Ok(Processed { id, file_count, failed: failures.len() })
    }

    /// Look up an artifact without claiming it.
    pub fn preview(&self, id: &str) -> Result<Preview> {
        let id: ArtifactId = id.parse().map_err(|_| ErrorKind::NotFound)?;
        self.delivery.preview(&id).map_err(|e| e.raise(ErrorKind::NotFound))
    }

    /// Claim an artifact for download. Unknown ids are [`NotFound`](ErrorKind::NotFound).
    pub async fn download(&self, id: &str) -> Result<Download> {
        let id: ArtifactId = id.parse().map_err(|_| ErrorKind::NotFound)?;
        self.delivery.serve(&id).await.map_err(|e| {
            let kind = match &*e {
                DeliveryErrorKind::NotFound(_) => ErrorKind::NotFound,
                DeliveryErrorKind::Unavailable(_) => ErrorKind::Delivery,
            };
            e.raise(kind)
        })
    }
}

/// Files received so far for one request.
///
/// Until [`into_files()`](Self::into_files) hands them to a batch, dropping
/// this deletes them in the background, so a request abandoned mid-upload
/// leaves nothing behind.
pub struct Uploads {
    scratch: Scratch,
    files: Vec<UploadedFile>,
}
impl Uploads {
    /// Put one client file into scratch storage.
    pub async fn store(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let location = self.scratch.allocate(Area::Upload, name);
        // Tracked before writing, so a write cut short is deleted as well.
        self.files.push(UploadedFile::new(name, location.clone(), data.len() as u64));
        if let Err(e) = self.scratch.backend().write(location.path(), data).await {
            self.scratch.discard(&location).await;
            self.files.pop();
            return Err(e.raise(ErrorKind::Storage));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Take ownership of the stored files; they are no longer deleted on drop.
    pub fn into_files(mut self) -> Vec<UploadedFile> {
        std::mem::take(&mut self.files)
    }
}
impl Drop for Uploads {
    fn drop(&mut self) {
        if self.files.is_empty() {
            return;
        }
        let files = std::mem::take(&mut self.files);
        match Handle::try_current() {
            Ok(handle) => {
                let scratch = self.scratch.clone();
                handle.spawn(async move {
                    for file in &files {
                        scratch.discard(&file.location).await;
                    }
                    tracing::debug!(files = files.len(), "Discarded abandoned uploads");
                });
            },
            Err(_) => tracing::warn!(files = files.len(), "No runtime to discard abandoned uploads; they are purged on next start"),
        }
    }
}
