pub mod backend;
pub mod error;
mod file;
mod path;
pub mod scratch;

pub use crate::backend::StorageBackend;
pub use crate::file::FileInfo;
pub use crate::path::validate as validate_path;
pub use crate::scratch::{Area, Location, Scratch};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
