//! Concurrent transformation of a batch of uploads.
//!
//! A [`Coordinator`] submits one [`Runner`](pressroom_transform::Runner)
//! invocation per uploaded file, at most `max_concurrency` at a time, and
//! folds each [`TransformOutcome`](pressroom_transform::TransformOutcome) into
//! a [`BatchState`]. The [`BatchResult`] is produced exactly once, when the
//! last outcome arrives; per-file failures never stop the rest of the batch.

mod coordinator;
pub mod error;
mod state;

pub use crate::coordinator::{BatchEvent, Coordinator, default_concurrency};
pub use crate::state::{BatchResult, BatchState};
