//! Core types for ckan-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Opaque identifier of a remote dataset (a CKAN datastore resource id)
///
/// The identifier doubles as the artifact file stem, so construction rejects
/// anything that could escape the output directory.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId(String);

/// Reason a string was rejected as a [`ResourceId`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidResourceId {
    /// Empty or whitespace-only
    #[error("resource id is empty")]
    Empty,
    /// Contains whitespace, a path separator, or is a relative path component
    #[error("resource id '{0}' contains characters not allowed in a file name")]
    UnsafeCharacters(String),
}

impl ResourceId {
    /// Validate and wrap an identifier (surrounding whitespace is trimmed)
    pub fn new(id: impl AsRef<str>) -> Result<Self, InvalidResourceId> {
        let id = id.as_ref().trim();
        if id.is_empty() {
            return Err(InvalidResourceId::Empty);
        }
        if id == "."
            || id == ".."
            || id
                .chars()
                .any(|c| c.is_whitespace() || c == '/' || c == '\\' || c.is_control())
        {
            return Err(InvalidResourceId::UnsafeCharacters(id.to_string()));
        }
        Ok(Self(id.to_string()))
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ResourceId {
    type Err = InvalidResourceId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ResourceId {
    type Error = InvalidResourceId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

/// Classification of a failed pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Non-2xx status, timeout, connection reset
    NetworkFailure,
    /// Response body could not be parsed into rows
    MalformedPayload,
    /// The API reported no records
    EmptyResult,
    /// The table could not be encoded as Parquet
    SerializationFailure,
    /// Disk full, permission denied, etc.
    IoFailure,
    /// Never admitted because the run was cancelled
    Cancelled,
    /// The pipeline task panicked
    Internal,
}

impl ErrorKind {
    /// Stable snake_case name (matches the serialized form)
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NetworkFailure => "network_failure",
            ErrorKind::MalformedPayload => "malformed_payload",
            ErrorKind::EmptyResult => "empty_result",
            ErrorKind::SerializationFailure => "serialization_failure",
            ErrorKind::IoFailure => "io_failure",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of one resource's pipeline
///
/// Produced exactly once per resource per run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConversionOutcome {
    /// Artifact written
    Success {
        /// Resource identifier
        resource: ResourceId,
        /// Final artifact path
        path: PathBuf,
        /// Number of rows written
        rows: usize,
    },
    /// Pipeline failed; sibling pipelines are unaffected
    Failure {
        /// Resource identifier
        resource: ResourceId,
        /// Error classification
        kind: ErrorKind,
        /// Human-readable error message
        message: String,
    },
}

impl ConversionOutcome {
    /// The resource this outcome belongs to
    pub fn resource(&self) -> &ResourceId {
        match self {
            ConversionOutcome::Success { resource, .. } => resource,
            ConversionOutcome::Failure { resource, .. } => resource,
        }
    }

    /// True for [`ConversionOutcome::Success`]
    pub fn is_success(&self) -> bool {
        matches!(self, ConversionOutcome::Success { .. })
    }

    /// Error kind, if this is a failure
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ConversionOutcome::Success { .. } => None,
            ConversionOutcome::Failure { kind, .. } => Some(*kind),
        }
    }

    /// Terminal pipeline state this outcome corresponds to
    pub fn state(&self) -> PipelineState {
        if self.is_success() {
            PipelineState::Succeeded
        } else {
            PipelineState::Failed
        }
    }
}

/// Per-resource pipeline state: `Queued -> InFlight -> {Succeeded | Failed}`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Waiting for a concurrency permit
    Queued,
    /// Fetching or writing
    InFlight,
    /// Artifact written (terminal)
    Succeeded,
    /// Pipeline failed (terminal)
    Failed,
}

impl PipelineState {
    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Succeeded | PipelineState::Failed)
    }
}

/// Event emitted by the converter
///
/// Consumers subscribe via [`Converter::subscribe`](crate::Converter::subscribe).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Resource accepted into the run
    Queued {
        /// Resource identifier
        resource: ResourceId,
    },

    /// Resource acquired a permit and its pipeline started
    Started {
        /// Resource identifier
        resource: ResourceId,
    },

    /// Payload fetched and parsed
    Fetched {
        /// Resource identifier
        resource: ResourceId,
        /// Number of rows parsed
        rows: usize,
        /// Number of columns parsed
        columns: usize,
    },

    /// Artifact written
    Converted {
        /// Resource identifier
        resource: ResourceId,
        /// Final artifact path
        path: PathBuf,
        /// Number of rows written
        rows: usize,
    },

    /// Pipeline failed
    Failed {
        /// Resource identifier
        resource: ResourceId,
        /// Error classification
        kind: ErrorKind,
        /// Error message
        error: String,
    },

    /// All resources accounted for
    RunComplete {
        /// Number of successful conversions
        succeeded: usize,
        /// Number of failed conversions
        failed: usize,
    },
}

impl Event {
    /// Pipeline state implied by this event (None for run-level events)
    pub fn state(&self) -> Option<PipelineState> {
        match self {
            Event::Queued { .. } => Some(PipelineState::Queued),
            Event::Started { .. } | Event::Fetched { .. } => Some(PipelineState::InFlight),
            Event::Converted { .. } => Some(PipelineState::Succeeded),
            Event::Failed { .. } => Some(PipelineState::Failed),
            Event::RunComplete { .. } => None,
        }
    }
}

/// Aggregated result of one run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    /// Outcomes in completion order
    pub outcomes: Vec<ConversionOutcome>,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the last outcome was collected
    pub finished_at: DateTime<Utc>,

    /// Highest number of pipelines observed in flight at once
    pub peak_in_flight: usize,
}

impl RunSummary {
    /// Number of resources processed
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Number of successful conversions
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of failed conversions
    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    /// Failed outcomes only
    pub fn failures(&self) -> impl Iterator<Item = &ConversionOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Outcome for a specific resource
    pub fn outcome_for(&self, resource: &ResourceId) -> Option<&ConversionOutcome> {
        self.outcomes.iter().find(|o| o.resource() == resource)
    }

    /// Outcomes re-sorted by resource identifier (completion order is not stable)
    pub fn sorted_by_resource(&self) -> Vec<&ConversionOutcome> {
        let mut sorted: Vec<&ConversionOutcome> = self.outcomes.iter().collect();
        sorted.sort_by(|a, b| a.resource().cmp(b.resource()));
        sorted
    }

    /// Wall-clock duration of the run
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
