//! Configuration System
//!
//! Layered configuration: built-in defaults, then an optional TOML file, then
//! `SITEGEN__SECTION__KEY` environment overrides. Every section has serde
//! defaults so a partial file is enough. `validate` reports every problem at
//! once rather than stopping at the first.

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::provider::BackendConfig;
use crate::queue::QueueSettings;
use crate::status::StatusMode;
use crate::worker::WorkerPoolConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod merge_policy;
mod sources;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "sitegen.toml";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SitegenConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub submission: SubmissionConfig,

    #[serde(default)]
    pub status: StatusConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueKind {
    /// Process-local, lost on exit
    Memory,
    /// Durable sled database
    #[default]
    Sled,
}

/// Work queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub kind: QueueKind,

    /// Database directory for the sled queue
    #[serde(default = "default_queue_path")]
    pub path: PathBuf,

    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,

    /// Drop a message after this many receives; unset means never
    #[serde(default)]
    pub max_receive_count: Option<u32>,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_queue_path() -> PathBuf {
    PathBuf::from("data/queue")
}

fn default_visibility_timeout_secs() -> u64 {
    300
}

fn default_poll_interval_ms() -> u64 {
    250
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            kind: QueueKind::default(),
            path: default_queue_path(),
            visibility_timeout_secs: default_visibility_timeout_secs(),
            max_receive_count: None,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl QueueConfig {
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }

    pub fn settings(&self) -> QueueSettings {
        QueueSettings {
            visibility_timeout: self.visibility_timeout(),
            max_receive_count: self.max_receive_count,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Memory,
    #[default]
    Filesystem,
}

/// Artifact store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,

    #[serde(default = "default_store_root")]
    pub root: PathBuf,
}

fn default_store_root() -> PathBuf {
    PathBuf::from("data/artifacts")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            root: default_store_root(),
        }
    }
}

/// Worker pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Upper bound on one backend call; must be below the visibility timeout
    #[serde(default = "default_backend_timeout_secs")]
    pub backend_timeout_secs: u64,

    #[serde(default = "default_receive_wait_ms")]
    pub receive_wait_ms: u64,

    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,
}

fn default_concurrency() -> usize {
    2
}

fn default_backend_timeout_secs() -> u64 {
    90
}

fn default_receive_wait_ms() -> u64 {
    1_000
}

fn default_error_backoff_ms() -> u64 {
    1_000
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            backend_timeout_secs: default_backend_timeout_secs(),
            receive_wait_ms: default_receive_wait_ms(),
            error_backoff_ms: default_error_backoff_ms(),
        }
    }
}

impl WorkerConfig {
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    pub fn pool_config(&self) -> WorkerPoolConfig {
        WorkerPoolConfig {
            concurrency: self.concurrency,
            receive_wait: Duration::from_millis(self.receive_wait_ms),
            error_backoff: Duration::from_millis(self.error_backoff_ms),
        }
    }
}

/// Submission settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// Session id used when a request omits one; unset rejects such requests
    #[serde(default)]
    pub guest_session_id: Option<String>,
}

/// Status settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusConfig {
    #[serde(default)]
    pub mode: StatusMode,

    /// Base for artifact URLs in `url` mode; defaults to `http://<server.bind>`
    #[serde(default)]
    pub public_base_url: Option<String>,
}

impl SitegenConfig {
    /// Base URL used for artifact links
    pub fn public_base_url(&self) -> String {
        self.status
            .public_base_url
            .clone()
            .unwrap_or_else(|| format!("http://{}", self.server.bind))
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ApiError> {
        self.server.bind.parse().map_err(|e| {
            ApiError::ConfigError(format!("Invalid bind address {}: {}", self.server.bind, e))
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.server.bind.parse::<SocketAddr>() {
            errors.push(ValidationError::Server(format!(
                "Invalid bind address '{}': {}",
                self.server.bind, e
            )));
        }

        if self.queue.visibility_timeout_secs == 0 {
            errors.push(ValidationError::Queue(
                "visibility_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.queue.poll_interval_ms == 0 {
            errors.push(ValidationError::Queue(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.queue.max_receive_count == Some(0) {
            errors.push(ValidationError::Queue(
                "max_receive_count must be at least 1 when set".to_string(),
            ));
        }
        if self.queue.kind == QueueKind::Sled && self.queue.path.as_os_str().is_empty() {
            errors.push(ValidationError::Queue("Queue path cannot be empty".to_string()));
        }

        if self.store.kind == StoreKind::Filesystem && self.store.root.as_os_str().is_empty() {
            errors.push(ValidationError::Store("Store root cannot be empty".to_string()));
        }

        if let Err(e) = self.backend.validate() {
            errors.push(ValidationError::Backend(e));
        }

        if self.worker.concurrency == 0 {
            errors.push(ValidationError::Worker(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.worker.backend_timeout_secs == 0 {
            errors.push(ValidationError::Worker(
                "backend_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.worker.backend_timeout() >= self.queue.visibility_timeout() {
            errors.push(ValidationError::Worker(format!(
                "backend_timeout_secs ({}) must be shorter than queue.visibility_timeout_secs ({})",
                self.worker.backend_timeout_secs, self.queue.visibility_timeout_secs
            )));
        }

        if let Some(url) = &self.status.public_base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                errors.push(ValidationError::Status(format!(
                    "public_base_url must start with http:// or https://: {}",
                    url
                )));
            }
        }

        if let Err(e) = crate::logging::validate_logging_config(&self.logging) {
            errors.push(ValidationError::Logging(e.to_string()));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Server(String),
    Queue(String),
    Store(String),
    Backend(String),
    Worker(String),
    Status(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Server(msg) => write!(f, "server: {}", msg),
            ValidationError::Queue(msg) => write!(f, "queue: {}", msg),
            ValidationError::Store(msg) => write!(f, "store: {}", msg),
            ValidationError::Backend(msg) => write!(f, "backend: {}", msg),
            ValidationError::Worker(msg) => write!(f, "worker: {}", msg),
            ValidationError::Status(msg) => write!(f, "status: {}", msg),
            ValidationError::Logging(msg) => write!(f, "logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from defaults, `path` (or `./sitegen.toml` when
    /// present) and the environment.
    pub fn load(path: Option<&Path>) -> Result<SitegenConfig, ApiError> {
        let mut builder = merge_policy::builder_with_defaults()?;
        builder = sources::add_file(builder, path)?;
        builder = sources::add_environment(builder);
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Load configuration from a single file, ignoring the environment.
    pub fn load_from_file(path: &Path) -> Result<SitegenConfig, ApiError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = sources::add_file(builder, Some(path))?;
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Load and validate, folding validation errors into one ApiError.
    pub fn load_validated(path: Option<&Path>) -> Result<SitegenConfig, ApiError> {
        let config = Self::load(path)?;
        config.validate().map_err(|errors| {
            ApiError::ConfigError(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;
        Ok(config)
    }
}
