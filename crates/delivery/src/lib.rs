//! Hand-off of finished artifacts to clients.
//!
//! [`Delivery`] keeps the registry of artifacts that are ready to download.
//! Every artifact is served at most once and deleted as soon as its transfer
//! ends, however it ends. Artifacts that are never fetched expire after a TTL.

mod artifact;
mod controller;
pub mod error;

pub use crate::artifact::{Artifact, ArtifactId};
pub use crate::controller::{DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL, Delivery, Download, Preview};
