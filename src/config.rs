//! Configuration types for ckan-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// Default CKAN endpoint for full CSV dumps
pub const DEFAULT_DUMP_URL: &str = "https://open.canada.ca/data/api/3/action/datastore_dump";

/// Default CKAN endpoint for paginated JSON queries
pub const DEFAULT_SEARCH_URL: &str = "https://open.canada.ca/data/api/3/action/datastore_search";

/// Transport used to retrieve a resource
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// One request returning the whole table as CSV
    #[default]
    Dump,
    /// Repeated `limit`/`offset` requests returning JSON `records`
    Paginated,
}

impl std::str::FromStr for FetchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dump" => Ok(FetchMode::Dump),
            "paginated" | "search" => Ok(FetchMode::Paginated),
            other => Err(Error::config(
                "mode",
                format!("unknown fetch mode '{}' (expected 'dump' or 'paginated')", other),
            )),
        }
    }
}

/// Remote API settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Transport (default: dump)
    #[serde(default)]
    pub mode: FetchMode,

    /// Endpoint URL (default depends on `mode`)
    #[serde(default)]
    pub api_url: Option<String>,

    /// Records per request in paginated mode (default: 1000)
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            mode: FetchMode::default(),
            api_url: None,
            page_size: default_page_size(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl FetchConfig {
    /// Endpoint to query: the configured URL, or the default for the mode
    pub fn endpoint(&self) -> &str {
        match (&self.api_url, self.mode) {
            (Some(url), _) => url,
            (None, FetchMode::Dump) => DEFAULT_DUMP_URL,
            (None, FetchMode::Paginated) => DEFAULT_SEARCH_URL,
        }
    }
}

/// Parquet compression codec
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    /// No compression
    Uncompressed,
    /// Snappy (default)
    #[default]
    Snappy,
    /// Zstandard
    Zstd,
    /// Gzip
    Gzip,
}

impl std::str::FromStr for Compression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "uncompressed" => Ok(Compression::Uncompressed),
            "snappy" => Ok(Compression::Snappy),
            "zstd" => Ok(Compression::Zstd),
            "gzip" => Ok(Compression::Gzip),
            other => Err(Error::config(
                "compression",
                format!("unknown compression '{}'", other),
            )),
        }
    }
}

/// Artifact output settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving `{resource_id}.parquet` files (default: "./parquet_files")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Parquet compression codec (default: snappy)
    #[serde(default)]
    pub compression: Compression,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            compression: Compression::default(),
        }
    }
}

/// Retry behavior for transient network failures
///
/// Retries are opt-in: with the default `max_attempts = 0` every resource is
/// attempted exactly once.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 0, disabled)
    #[serde(default)]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Main configuration for ckan-dl
///
/// Sub-configs are flattened, so a config file is one flat JSON object:
///
/// ```json
/// { "mode": "paginated", "page_size": 500, "output_dir": "./out", "max_concurrent_resources": 8 }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Remote API settings
    #[serde(flatten)]
    pub fetch: FetchConfig,

    /// Artifact output settings
    #[serde(flatten)]
    pub output: OutputConfig,

    /// Maximum number of resources fetched and converted at once (default: 4)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_resources: usize,

    /// Retry behavior (nested: `"retry": { ... }`)
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            output: OutputConfig::default(),
            max_concurrent_resources: default_max_concurrent(),
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Load a configuration from a JSON file; missing keys take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Output directory
    pub fn output_dir(&self) -> &PathBuf {
        &self.output.output_dir
    }

    /// Check invariants the pipeline relies on
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_resources == 0 {
            return Err(Error::config(
                "max_concurrent_resources",
                "max_concurrent_resources must be at least 1",
            ));
        }
        if self.max_concurrent_resources > tokio::sync::Semaphore::MAX_PERMITS {
            return Err(Error::config(
                "max_concurrent_resources",
                format!(
                    "max_concurrent_resources must be at most {}",
                    tokio::sync::Semaphore::MAX_PERMITS
                ),
            ));
        }
        if self.fetch.page_size == 0 {
            return Err(Error::config("page_size", "page_size must be at least 1"));
        }
        if self.fetch.request_timeout.is_zero() {
            return Err(Error::config(
                "request_timeout",
                "request_timeout must be greater than zero",
            ));
        }

        let endpoint = self.fetch.endpoint();
        let url = url::Url::parse(endpoint).map_err(|e| {
            Error::config("api_url", format!("invalid endpoint '{}': {}", endpoint, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(
                "api_url",
                format!("endpoint '{}' must use http or https", endpoint),
            ));
        }

        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(Error::config(
                "retry.backoff_multiplier",
                "backoff_multiplier must be a finite number of at least 1.0",
            ));
        }

        Ok(())
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./parquet_files")
}

fn default_max_concurrent() -> usize {
    4
}

fn default_page_size() -> usize {
    1000
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("ckan-dl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_true() -> bool {
    true
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
