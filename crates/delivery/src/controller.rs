use crate::artifact::{Artifact, ArtifactId};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use pressroom_archive::Package;
use pressroom_asyncutils::finally;
use pressroom_storage::backend::ByteStream;
use pressroom_storage::{Location, Scratch};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::instrument;

pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// An artifact being handed to a client.
///
/// The artifact is already unregistered; its file is deleted when `body`
/// ends or is dropped.
pub struct Download {
    pub id: ArtifactId,
    pub filename: String,
    pub content_type: &'static str,
    pub size: u64,
    pub body: ByteStream,
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("id", &self.id)
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// What a download of an artifact would send, without claiming it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Preview {
    pub id: ArtifactId,
    pub filename: String,
    pub content_type: &'static str,
    pub size: u64,
}

/// Registry of artifacts awaiting their one download.
///
/// Each artifact can be served once: [`serve()`](Self::serve) removes it from
/// the registry before any byte is sent, so a second request for the same id
/// is a [`NotFound`](ErrorKind::NotFound) even while the first transfer is
/// still running. Artifacts nobody fetches are removed by
/// [`sweep()`](Self::sweep) after the TTL.
pub struct Delivery {
    scratch: Scratch,
    ttl: Duration,
    artifacts: Mutex<HashMap<ArtifactId, Artifact>>,
}
impl Delivery {
    pub fn new(scratch: Scratch) -> Self {
        Self {
            scratch,
            ttl: DEFAULT_TTL,
            artifacts: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Make `package` downloadable and return its id.
    pub fn register(&self, package: Package) -> ArtifactId {
        let artifact = Artifact::new(package);
        let id = artifact.id;
        tracing::info!(artifact = %id, location = %artifact.location, bytes = artifact.size, "Artifact ready");
        self.artifacts().insert(id, artifact);
        id
    }

    pub fn contains(&self, id: &ArtifactId) -> bool {
        self.artifacts().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.artifacts().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Describe the artifact `id`, leaving it downloadable.
    pub fn preview(&self, id: &ArtifactId) -> Result<Preview> {
        let artifacts = self.artifacts();
        let artifact = artifacts.get(id).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(id.to_string())))?;
        Ok(Preview {
            id: artifact.id,
            filename: artifact.filename.clone(),
            content_type: artifact.content_type,
            size: artifact.size,
        })
    }

    /// Claim the artifact `id` and stream it.
    #[instrument(skip_all, fields(artifact = %id))]
    pub async fn serve(&self, id: &ArtifactId) -> Result<Download> {
        let artifact = self
            .artifacts()
            .remove(id)
            .ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(id.to_string())))?;
        let stream = match self.scratch.backend().stream(artifact.location.path()).await {
            Ok(stream) => stream,
            Err(e) => {
                self.scratch.discard(&artifact.location).await;
                return Err(e).or_raise(|| ErrorKind::Unavailable(id.to_string()));
            },
        };
        tracing::info!(filename = %artifact.filename, bytes = artifact.size, "Serving artifact");
        let hook = delete_later(self.scratch.clone(), artifact.location.clone());
        Ok(Download {
            id: artifact.id,
            filename: artifact.filename,
            content_type: artifact.content_type,
            size: artifact.size,
            body: Box::pin(finally(stream, hook)),
        })
    }

    /// Remove every artifact older than the TTL; returns how many went.
    pub async fn sweep(&self) -> usize {
        self.sweep_at(Instant::now()).await
    }

    async fn sweep_at(&self, now: Instant) -> usize {
        let expired: Vec<Artifact> = {
            let mut artifacts = self.artifacts();
            let ids: Vec<ArtifactId> =
                artifacts.values().filter(|a| a.is_expired(self.ttl, now)).map(|a| a.id).collect();
            ids.iter().filter_map(|id| artifacts.remove(id)).collect()
        };
        for artifact in &expired {
            tracing::info!(artifact = %artifact.id, "Artifact expired without being downloaded");
            self.scratch.discard(&artifact.location).await;
        }
        expired.len()
    }

    /// Run [`sweep()`](Self::sweep) every `interval` until the returned task
    /// is aborted.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = self.sweep().await;
                if removed > 0 {
                    tracing::debug!(removed, remaining = self.len(), "Expiry sweep");
                }
            }
        })
    }

    fn artifacts(&self) -> std::sync::MutexGuard<'_, HashMap<ArtifactId, Artifact>> {
        self.artifacts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cleanup for a served artifact. Runs inside `Drop`, so the delete is
/// spawned rather than awaited.
fn delete_later(scratch: Scratch, location: Location) -> impl FnOnce() + Send + 'static {
    move || match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                scratch.discard(&location).await;
                tracing::debug!(%location, "Deleted delivered artifact");
            });
        },
        Err(_) => tracing::warn!(%location, "No runtime to delete delivered artifact; it is purged on next start"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use pressroom_storage::backend::MockBackend;
    use pressroom_storage::{Area, StorageBackend};

    async fn setup() -> (Arc<MockBackend>, Delivery, Package) {
        let backend = Arc::new(MockBackend::default());
        let scratch = Scratch::new(backend.clone());
        let location = scratch.allocate(Area::Artifact, "compressed_pdfs.zip");
        backend.write(location.path(), b"PK zip bytes").await.unwrap();
        let package = Package {
            location,
            filename: "compressed_pdfs.zip".to_string(),
            content_type: "application/zip",
            size: 12,
            members: 2,
        };
        (backend, Delivery::new(scratch), package)
    }

    /// Let spawned deletions run.
    async fn settle(backend: &MockBackend) {
        for _ in 0..100 {
            if backend.is_empty() {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_serve_is_single_use() {
        let (backend, delivery, package) = setup().await;
        let id = delivery.register(package);
        assert!(delivery.contains(&id));

        let download = delivery.serve(&id).await.unwrap();
        assert_eq!(download.filename, "compressed_pdfs.zip");
        assert_eq!(download.content_type, "application/zip");
        // Claimed before the body is read.
        assert!(!delivery.contains(&id));
        let err = delivery.serve(&id).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));

        let chunks: Vec<_> = download.body.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), b"PK zip bytes");
        settle(&backend).await;
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_preview_does_not_claim() {
        let (backend, delivery, package) = setup().await;
        let id = delivery.register(package);
        let preview = delivery.preview(&id).unwrap();
        assert_eq!(preview.filename, "compressed_pdfs.zip");
        assert_eq!(preview.size, 12);
        assert!(delivery.contains(&id));
        assert!(!backend.is_empty());
        assert!(delivery.serve(&id).await.is_ok());
        assert!(matches!(&*delivery.preview(&id).unwrap_err(), ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_aborted_download_still_deletes() {
        let (backend, delivery, package) = setup().await;
        let id = delivery.register(package);
        let download = delivery.serve(&id).await.unwrap();
        drop(download);
        settle(&backend).await;
        assert!(backend.is_empty());
        assert!(delivery.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let (_backend, delivery, _package) = setup().await;
        let err = delivery.serve(&ArtifactId::new()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let (backend, delivery, package) = setup().await;
        backend.delete(package.location.path()).await.unwrap();
        let id = delivery.register(package);
        let err = delivery.serve(&id).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Unavailable(_)));
        assert!(delivery.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_expires_old_artifacts() {
        let (backend, delivery, package) = setup().await;
        let delivery = delivery.with_ttl(Duration::from_secs(60));
        let id = delivery.register(package);
        assert_eq!(delivery.sweep().await, 0);
        assert!(delivery.contains(&id));

        assert_eq!(delivery.sweep_at(Instant::now() + Duration::from_secs(61)).await, 1);
        assert!(!delivery.contains(&id));
        assert!(backend.is_empty());
        assert_eq!(delivery.sweep_at(Instant::now() + Duration::from_secs(120)).await, 0);
    }

    #[tokio::test]
    async fn test_sweeper_task() {
        let (backend, delivery, package) = setup().await;
        let delivery = Arc::new(delivery.with_ttl(Duration::ZERO));
        delivery.register(package);
        let sweeper = Arc::clone(&delivery).spawn_sweeper(Duration::from_millis(5));
        for _ in 0..100 {
            if delivery.is_empty() && backend.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        sweeper.abort();
        assert!(delivery.is_empty());
        assert!(backend.is_empty());
    }
}
