use crate::error::{ErrorKind, Result};
use crate::state::{BatchResult, BatchState};
use async_stream::stream;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt, pin_mut};
use pressroom_transform::{Runner, TransformOutcome, UploadedFile};
use std::num::NonZeroUsize;
use std::thread::available_parallelism;
use std::time::Instant;
use uuid::Uuid;

/// Progress events emitted by [`Coordinator::events`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. [`Completed`](Self::Completed), once per submitted file, in completion
///    order.
/// 3. [`Finished`](Self::Finished), exactly once, right after the last
///    `Completed`.
#[derive(Clone, Debug)]
pub enum BatchEvent {
    Started { batch: Uuid, expected: usize },
    Completed {
        outcome: TransformOutcome,
        completed: usize,
        expected: usize,
    },
    Finished(BatchResult),
}

/// Default cap on simultaneous tool processes.
pub fn default_concurrency() -> NonZeroUsize {
    available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

/// Runs one [`Runner`] invocation per file of a batch and reports when all
/// of them have finished.
#[derive(Clone)]
pub struct Coordinator {
    runner: Runner,
    max_concurrency: NonZeroUsize,
}
impl Coordinator {
    pub fn new(runner: Runner) -> Self {
        Self {
            runner,
            max_concurrency: default_concurrency(),
        }
    }

    pub fn with_max_concurrency(mut self, max: NonZeroUsize) -> Self {
        self.max_concurrency = max;
        self
    }

    pub fn runner(&self) -> &Runner {
        &self.runner
    }

    /// Transform every file and return the aggregated result.
    pub async fn run(&self, files: Vec<UploadedFile>) -> Result<BatchResult> {
        let expected = files.len();
        let mut recorded = 0;
        let events = self.events(files);
        pin_mut!(events);
        while let Some(event) = events.next().await {
            match event {
                BatchEvent::Completed { completed, .. } => recorded = completed,
                BatchEvent::Finished(result) => return Ok(result),
                BatchEvent::Started { .. } => {},
            }
        }
        exn::bail!(ErrorKind::Incomplete { recorded, expected })
    }

    /// Streams [`BatchEvent`]s while the files of one batch are transformed.
    ///
    /// At most `max_concurrency` tools run at once; the next file is started
    /// as each one finishes, in submission order. Dropping the stream early
    /// kills the running tools but leaves unstarted uploads in storage.
    pub fn events(&self, files: Vec<UploadedFile>) -> impl Stream<Item = BatchEvent> + '_ {
        stream!({
            let batch = Uuid::new_v4();
            let expected = files.len();
            let started = Instant::now();
            tracing::info!(%batch, files = expected, max_concurrency = self.max_concurrency.get(), "Starting batch");
            yield BatchEvent::Started { batch, expected };

            if expected == 0 {
                yield BatchEvent::Finished(BatchResult::Empty);
                return;
            }

            let mut state = BatchState::new(expected);
            let mut pending = files.into_iter().map(|file| self.runner.run(file));
            let mut processing: FuturesUnordered<_> = pending.by_ref().take(self.max_concurrency.get()).collect();
            while let Some(outcome) = processing.next().await {
                // FIFO refill: the next file starts as soon as a slot frees up.
                if let Some(next) = pending.next() {
                    processing.push(next);
                }
                let result = state.record(outcome.clone());
                tracing::debug!(%batch, file = outcome.source_name(), ok = outcome.is_success(), completed = state.recorded(), expected, "Outcome recorded");
                yield BatchEvent::Completed { outcome, completed: state.recorded(), expected };
                match result {
                    Ok(Some(result)) => {
                        tracing::info!(
                            %batch,
                            succeeded = result.successes().len(),
                            failed = result.failures().len(),
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Batch complete"
                        );
                        yield BatchEvent::Finished(result);
                    },
                    Ok(None) => {},
                    Err(e) => tracing::error!(%batch, error = ?e, "Discarded outcome"),
                }
            }
        })
    }
}
