use crate::error::{ErrorKind, Result};
use crate::outcome::{Failure, Success, TransformOutcome, UploadedFile, display_name};
use crate::transformer::Transformer;
use exn::ResultExt;
use pressroom_storage::{Area, Location, Scratch};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_OUTPUT_PREFIX: &str = "compressed_";

/// Applies a [`Transformer`] to one uploaded file at a time.
///
/// [`run()`](Self::run) always consumes the upload: the input is deleted
/// whatever happens, and a failed attempt leaves no output behind.
#[derive(Clone)]
pub struct Runner {
    scratch: Scratch,
    transformer: Arc<dyn Transformer>,
    timeout: Duration,
    output_prefix: String,
}
impl Runner {
    pub fn new(scratch: Scratch, transformer: Arc<dyn Transformer>) -> Self {
        Self {
            scratch,
            transformer,
            timeout: DEFAULT_TIMEOUT,
            output_prefix: DEFAULT_OUTPUT_PREFIX.to_string(),
        }
    }

    /// Kill the tool if it hasn't finished within `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_output_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.output_prefix = prefix.into();
        self
    }

    pub fn scratch(&self) -> &Scratch {
        &self.scratch
    }

    /// Transform `file`, reporting the result instead of returning an error.
    #[instrument(skip_all, fields(file = %file.name, tool = self.transformer.name()))]
    pub async fn run(&self, file: UploadedFile) -> TransformOutcome {
        let display_name = display_name(&self.output_prefix, &file.name);
        let output = self.scratch.allocate(Area::Output, &display_name);
        let result = self.attempt(&file, &output).await;
        self.scratch.discard(&file.location).await;
        match result {
            Ok(size) => {
                tracing::info!(input_bytes = file.size, output_bytes = size, "Transformed file");
                TransformOutcome::Succeeded(Success {
                    source_name: file.name,
                    display_name,
                    output,
                    size,
                })
            },
            Err(e) => {
                self.scratch.discard(&output).await;
                tracing::warn!(error = ?e, "Failed to transform file");
                TransformOutcome::Failed(Failure {
                    source_name: file.name,
                    cause: (*e).to_string(),
                })
            },
        }
    }

    async fn attempt(&self, file: &UploadedFile, output: &Location) -> Result<u64> {
        let input = self.scratch.resolve(&file.location).or_raise(|| ErrorKind::Storage)?;
        let target = self.scratch.resolve(output).or_raise(|| ErrorKind::Storage)?;
        // Dropping the transform future on timeout kills the child process.
        match tokio::time::timeout(self.timeout, self.transformer.transform(&input, &target)).await {
            Ok(result) => result?,
            Err(_) => exn::bail!(ErrorKind::Timeout(self.timeout)),
        }
        let info = self.scratch.backend().stat(output.path()).await.or_raise(|| ErrorKind::EmptyOutput)?;
        if info.size == 0 {
            exn::bail!(ErrorKind::EmptyOutput);
        }
        Ok(info.size)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::transformer::CustomCommand;
    use pressroom_storage::backend::{LocalBackend, MockBackend};
    use pressroom_storage::StorageBackend;

    fn scratch() -> (tempfile::TempDir, Scratch) {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("scratch", dir.path()).unwrap();
        (dir, Scratch::new(Arc::new(backend)))
    }

    async fn upload(scratch: &Scratch, name: &str, data: &[u8]) -> UploadedFile {
        let location = scratch.allocate(Area::Upload, name);
        scratch.backend().write(location.path(), data).await.unwrap();
        UploadedFile::new(name, location, data.len() as u64)
    }

    fn shell(script: &str) -> Arc<dyn Transformer> {
        Arc::new(CustomCommand::new("sh", ["-c", script, "sh", "{input}", "{output}"]))
    }

    #[tokio::test]
    async fn test_success_consumes_input() {
        let (_dir, scratch) = scratch();
        let file = upload(&scratch, "report.pdf", b"%PDF-1.7 original").await;
        let runner = Runner::new(scratch.clone(), Arc::new(CustomCommand::new("cp", ["{input}", "{output}"])));
        let TransformOutcome::Succeeded(success) = runner.run(file.clone()).await else {
            panic!("expected success");
        };
        assert_eq!(success.source_name, "report.pdf");
        assert_eq!(success.display_name, "compressed_report.pdf");
        assert_eq!(success.size, 17);
        assert!(!scratch.backend().exists(file.location.path()).await.unwrap());
        assert_eq!(scratch.backend().read(success.output.path()).await.unwrap(), b"%PDF-1.7 original");
        assert_eq!(scratch.count(Area::Upload).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_tool_failure_cleans_everything() {
        let (_dir, scratch) = scratch();
        let file = upload(&scratch, "broken.pdf", b"not a pdf").await;
        // Writes a partial output before failing.
        let runner = Runner::new(scratch.clone(), shell("echo partial > \"$2\"; echo 'Unrecoverable error' >&2; exit 1"));
        let TransformOutcome::Failed(failure) = runner.run(file).await else {
            panic!("expected failure");
        };
        assert_eq!(failure.source_name, "broken.pdf");
        assert!(failure.cause.contains("Unrecoverable error"), "{}", failure.cause);
        assert_eq!(scratch.count(Area::Upload).await.unwrap(), 0);
        assert_eq!(scratch.count(Area::Output).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_timeout() {
        let (_dir, scratch) = scratch();
        let file = upload(&scratch, "slow.pdf", b"%PDF").await;
        let runner = Runner::new(scratch.clone(), shell("sleep 10")).with_timeout(Duration::from_millis(100));
        let outcome = runner.run(file).await;
        assert!(matches!(&outcome, TransformOutcome::Failed(f) if f.cause.contains("timed out")), "{outcome:?}");
        assert_eq!(scratch.count(Area::Upload).await.unwrap(), 0);
        assert_eq!(scratch.count(Area::Output).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_output_is_a_failure() {
        let (_dir, scratch) = scratch();
        let file = upload(&scratch, "a.pdf", b"%PDF").await;
        let runner = Runner::new(scratch.clone(), shell(": > \"$2\""));
        let outcome = runner.run(file).await;
        assert!(matches!(&outcome, TransformOutcome::Failed(f) if f.cause == "tool produced no output"));
        assert_eq!(scratch.count(Area::Output).await.unwrap(), 0);

        let file = upload(&scratch, "b.pdf", b"%PDF").await;
        let outcome = Runner::new(scratch.clone(), shell("exit 0")).run(file).await;
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_missing_program() {
        let (_dir, scratch) = scratch();
        let file = upload(&scratch, "a.pdf", b"%PDF").await;
        let runner = Runner::new(scratch.clone(), Arc::new(CustomCommand::new("/no/such/gs", ["{input}"])));
        assert!(!runner.run(file).await.is_success());
        assert_eq!(scratch.count(Area::Upload).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unaddressable_storage() {
        let scratch = Scratch::new(Arc::new(MockBackend::default()));
        let file = upload(&scratch, "a.pdf", b"%PDF").await;
        let runner = Runner::new(scratch.clone(), shell("cp \"$1\" \"$2\"")).with_output_prefix("small-");
        let outcome = runner.run(file).await;
        assert_eq!(outcome.source_name(), "a.pdf");
        assert!(!outcome.is_success());
        assert_eq!(scratch.count(Area::Upload).await.unwrap(), 0);
    }
}
