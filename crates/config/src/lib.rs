//! Layered configuration.
//!
//! Settings come from, in increasing precedence:
//!
//! 1. built-in defaults,
//! 2. a config file (`toml`, `yaml` or `json`), either given explicitly or
//!    `pressroom.toml` in the platform config directory,
//! 3. environment variables prefixed `PRESSROOM_`, with `__` separating
//!    sections (`PRESSROOM_BATCH__MAX_CONCURRENCY=4`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Json, Toml, Yaml};
use pressroom_archive::{Method, Packaging};
use pressroom_transform::Preset;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "PRESSROOM_";
pub const CONFIG_FILE_NAME: &str = "pressroom.toml";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub transform: TransformConfig,
    pub batch: BatchConfig,
    pub archive: ArchiveConfig,
    pub delivery: DeliveryConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Multipart field carrying the files.
    pub upload_field: String,
    /// Limit on the whole request body.
    pub max_upload_bytes: usize,
}
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::LOCALHOST, 3000)),
            upload_field: "pdfs".to_string(),
            max_upload_bytes: 256 * 1024 * 1024,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Scratch directory. Everything under it is deleted at startup.
    pub root: PathBuf,
}
impl Default for StorageConfig {
    fn default() -> Self {
        Self { root: std::env::temp_dir().join("pressroom") }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Ghostscript executable; searched for in `PATH` when unset.
    pub program: Option<PathBuf>,
    pub preset: Preset,
    pub compatibility: String,
    pub timeout_secs: u64,
    pub output_prefix: String,
}
impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            program: None,
            preset: Preset::default(),
            compatibility: "1.4".to_string(),
            timeout_secs: 120,
            output_prefix: "compressed_".to_string(),
        }
    }
}
impl TransformConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Tool processes allowed at once; the number of CPUs when unset.
    pub max_concurrency: Option<usize>,
}
impl BatchConfig {
    pub fn max_concurrency(&self) -> Option<NonZeroUsize> {
        self.max_concurrency.and_then(NonZeroUsize::new)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub method: Method,
    pub name: String,
    /// Whether a batch with one success is still zipped.
    pub single_file: Packaging,
}
impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            method: Method::default(),
            name: "compressed_pdfs.zip".to_string(),
            single_file: Packaging::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// How long an artifact waits for its download.
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}
impl Default for DeliveryConfig {
    fn default() -> Self {
        Self { ttl_secs: 60 * 60, sweep_interval_secs: 60 }
    }
}
impl DeliveryConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

/// `pressroom.toml` in the platform config directory, if there is one.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "pressroom").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Load and validate the configuration.
///
/// An explicit `path` must exist; the default location is optional.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let mut figment = Figment::new();
    match path {
        Some(path) if !path.is_file() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
        Some(path) => figment = merge_file(figment, path)?,
        None => {
            if let Some(path) = default_path().filter(|p| p.is_file()) {
                figment = merge_file(figment, &path)?;
            }
        },
    }
    let config: Config = figment
        .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__"))
        .extract()
        .map_err(|e| ErrorKind::Invalid(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    tracing::debug!(path = %path.display(), "Loading config file");
    let extension = path.extension().and_then(|e| e.to_str()).map(str::to_lowercase);
    Ok(match extension.as_deref() {
        Some("toml") => figment.merge(Toml::file(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
        Some("json") => figment.merge(Json::file(path)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
    })
}

impl Config {
    /// Reject settings that parse but cannot work.
    pub fn validate(&self) -> Result<()> {
        let problem = if self.batch.max_concurrency == Some(0) {
            "batch.max_concurrency must be at least 1"
        } else if self.transform.timeout_secs == 0 {
            "transform.timeout_secs must be at least 1"
        } else if self.delivery.sweep_interval_secs == 0 {
            "delivery.sweep_interval_secs must be at least 1"
        } else if self.archive.name.trim().is_empty() {
            "archive.name must not be empty"
        } else if self.server.upload_field.is_empty() {
            "server.upload_field must not be empty"
        } else if !self.storage.root.is_absolute() {
            "storage.root must be an absolute path"
        } else {
            return Ok(());
        };
        exn::bail!(ErrorKind::Constraint(problem.to_string()))
    }
}
