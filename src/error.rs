//! Error types for ckan-dl
//!
//! This module provides the error taxonomy for the library:
//! - [`FetchError`] - failures retrieving or parsing one resource
//! - [`WriteError`] - failures persisting one resource as a Parquet artifact
//! - [`ConversionError`] - the error of a single fetch-and-convert pipeline
//! - [`Error`] - run-level failures (configuration, identifier source, HTTP client setup)
//!
//! Per-resource errors never escape their pipeline: the coordinator turns them
//! into [`ConversionOutcome::Failure`](crate::types::ConversionOutcome) values.

use crate::types::ErrorKind;
use thiserror::Error;

/// Result type alias for ckan-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ckan-dl
///
/// Used for failures that concern the run as a whole rather than a single resource.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "page_size")
        key: Option<String>,
    },

    /// I/O error (identifier source unreadable, config file missing, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client construction or transport error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error (config file, JSON report)
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A single resource pipeline failed
    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// Run cancelled - not admitting new resources
    #[error("shutdown in progress: not admitting new resources")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

/// Failures while retrieving a resource's tabular payload
#[derive(Debug, Error)]
pub enum FetchError {
    /// Non-2xx status, timeout, connection failure or truncated body
    #[error("network failure: {message}")]
    NetworkFailure {
        /// Human-readable description including the URL
        message: String,
        /// HTTP status code, when the server answered
        status: Option<u16>,
        /// Whether the failure is likely to go away on its own (timeouts, 5xx, 429)
        transient: bool,
    },

    /// Response body could not be parsed into rows
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The API reported no records for the resource
    #[error("no records returned for resource")]
    EmptyResult,
}

impl FetchError {
    /// Classify a reqwest transport error
    pub fn from_reqwest(err: reqwest::Error, url: &str) -> Self {
        let transient = err.is_timeout() || err.is_connect();
        let message = if err.is_timeout() {
            format!("timeout fetching '{}'", url)
        } else if err.is_connect() {
            format!("connection failed for '{}': {}", url, err)
        } else {
            format!("request to '{}' failed: {}", url, err)
        };

        FetchError::NetworkFailure {
            message,
            status: err.status().map(|s| s.as_u16()),
            transient,
        }
    }

    /// Build a failure for a non-2xx HTTP status
    pub fn from_status(status: reqwest::StatusCode, url: &str) -> Self {
        FetchError::NetworkFailure {
            message: format!("HTTP {} from '{}'", status, url),
            status: Some(status.as_u16()),
            transient: status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Outcome classification for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::NetworkFailure { .. } => ErrorKind::NetworkFailure,
            FetchError::MalformedPayload(_) => ErrorKind::MalformedPayload,
            FetchError::EmptyResult => ErrorKind::EmptyResult,
        }
    }
}

/// Failures while persisting a table as a columnar artifact
#[derive(Debug, Error)]
pub enum WriteError {
    /// The table could not be encoded (no columns, Arrow or Parquet encoding failure)
    #[error("serialization failure: {0}")]
    SerializationFailure(String),

    /// Disk full, permission denied, rename failed, etc.
    #[error("I/O failure: {0}")]
    IoFailure(#[from] std::io::Error),
}

impl WriteError {
    /// Outcome classification for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            WriteError::SerializationFailure(_) => ErrorKind::SerializationFailure,
            WriteError::IoFailure(_) => ErrorKind::IoFailure,
        }
    }
}

impl From<arrow::error::ArrowError> for WriteError {
    fn from(err: arrow::error::ArrowError) -> Self {
        WriteError::SerializationFailure(err.to_string())
    }
}

impl From<parquet::errors::ParquetError> for WriteError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        WriteError::SerializationFailure(err.to_string())
    }
}

/// The error of one resource's fetch-and-convert pipeline
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Fetch stage failed
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Write stage failed
    #[error(transparent)]
    Write(#[from] WriteError),
}

impl ConversionError {
    /// Outcome classification for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConversionError::Fetch(e) => e.kind(),
            ConversionError::Write(e) => e.kind(),
        }
    }
}
