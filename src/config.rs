use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Backing store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Near-cache and locking configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Write-through retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Named flows
    #[serde(default)]
    pub flows: Vec<FlowConfig>,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the embedded defaults, a file and the environment
    ///
    /// The file path is `path` if given, otherwise `CONFIG_PATH`, otherwise
    /// `config/model-grid.toml`; a missing file is not an error.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = path
            .map(str::to_string)
            .or_else(|| std::env::var("CONFIG_PATH").ok())
            .unwrap_or_else(|| "config/model-grid.toml".to_string());

        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: MODEL_GRID_)
            .add_source(
                config::Environment::with_prefix("MODEL_GRID")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot be wired into flows
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for flow in &self.flows {
            if flow.name.trim().is_empty() {
                return Err(AppError::Configuration("flow name must not be empty".to_string()));
            }
            if !names.insert(flow.name.as_str()) {
                return Err(AppError::Configuration(format!(
                    "duplicate flow name '{}'",
                    flow.name
                )));
            }
            if flow.workers == 0 {
                return Err(AppError::Configuration(format!(
                    "flow '{}' needs at least one worker",
                    flow.name
                )));
            }
            if flow.queue_size == 0 {
                return Err(AppError::Configuration(format!(
                    "flow '{}' needs a non-zero queue size",
                    flow.name
                )));
            }
        }

        if self.cache.lock_shards == 0 {
            return Err(AppError::Configuration("cache.lock_shards must be > 0".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::Configuration("retry.max_attempts must be > 0".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store backend type
    #[serde(default)]
    pub backend: StoreBackend,

    /// SQLite connection string
    pub database_url: Option<String>,

    /// Path for the embedded sled database
    pub path: Option<PathBuf>,

    /// Database connection pool size
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            database_url: Some("sqlite://./data/models.db?mode=rwc".to_string()),
            path: None,
            pool_size: default_pool_size(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Sled,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of models held in the near-cache
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,

    /// Near-cache time-to-live (seconds); 0 disables expiry
    #[serde(default)]
    pub ttl_secs: u64,

    /// Number of per-id lock shards
    #[serde(default = "default_lock_shards")]
    pub lock_shards: usize,

    /// Bound on waiting for a model's lock (milliseconds)
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Bound on a single store call (milliseconds)
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_max_capacity(),
            ttl_secs: 0,
            lock_shards: default_lock_shards(),
            lock_timeout_ms: default_lock_timeout_ms(),
            store_timeout_ms: default_store_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts for a store call, first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds)
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound for any single delay (milliseconds)
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Flow (channel) name
    pub name: String,

    /// Classifier kind
    #[serde(default = "default_classifier")]
    pub classifier: String,

    /// Classifier option string, e.g. "-L 0.1 -M 0.0"
    #[serde(default)]
    pub options: String,

    /// Concurrent event workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Inbound queue capacity
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
}

impl FlowConfig {
    pub fn new(name: impl Into<String>, classifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            classifier: classifier.into(),
            options: String::new(),
            workers: default_workers(),
            queue_size: default_queue_size(),
        }
    }

    pub fn with_options(mut self, options: impl Into<String>) -> Self {
        self.options = options.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON logs
    #[serde(default)]
    pub json_logs: bool,

    /// Expose Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            prometheus_enabled: true,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_pool_size() -> u32 {
    10
}

fn default_max_capacity() -> u64 {
    10_000
}

fn default_lock_shards() -> usize {
    64
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

fn default_store_timeout_ms() -> u64 {
    2_000
}

fn default_max_attempts() -> u32 {
    4
}

fn default_initial_backoff_ms() -> u64 {
    50
}

fn default_max_backoff_ms() -> u64 {
    2_000
}

fn default_classifier() -> String {
    "naive_bayes".to_string()
}

fn default_workers() -> usize {
    4
}

fn default_queue_size() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
