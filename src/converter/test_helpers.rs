//! Shared test helpers: scripted fetchers and an in-memory writer.

use crate::config::Config;
use crate::converter::Converter;
use crate::error::{FetchError, WriteError};
use crate::fetcher::ResourceFetcher;
use crate::table::{Column, ColumnData, StructuredTable};
use crate::types::ResourceId;
use crate::writer::TableWriter;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a [`ScriptedFetcher`] does for one resource
#[derive(Clone, Debug)]
pub(crate) enum Behavior {
    /// Return a table with this many rows
    Rows(usize),
    /// Fail with HTTP 500
    ServerError,
    /// Fail with HTTP 404
    NotFound,
    /// Return no records
    Empty,
    /// Return an unparseable payload
    Malformed,
    /// Fail with a transient error this many times, then return rows
    FlakyThenRows(usize, usize),
    /// Panic inside the fetch
    Panic,
}

/// Fetcher that follows a per-resource script and records concurrency
pub(crate) struct ScriptedFetcher {
    behaviors: HashMap<String, Behavior>,
    default: Behavior,
    delay: Duration,
    current: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
    attempts: Mutex<HashMap<String, usize>>,
}

impl ScriptedFetcher {
    pub(crate) fn new(default: Behavior) -> Self {
        Self {
            behaviors: HashMap::new(),
            default,
            delay: Duration::ZERO,
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn with(mut self, resource: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(resource.to_string(), behavior);
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Highest number of concurrent `fetch` calls observed
    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Total number of `fetch` calls
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceFetcher for ScriptedFetcher {
    async fn fetch(&self, resource: &ResourceId) -> Result<StructuredTable, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(resource.to_string()).or_insert(0);
            *n += 1;
            *n
        };

        let behavior = self
            .behaviors
            .get(resource.as_str())
            .cloned()
            .unwrap_or_else(|| self.default.clone());

        self.current.fetch_sub(1, Ordering::SeqCst);

        match behavior {
            Behavior::Rows(rows) => Ok(sample_table(rows)),
            Behavior::ServerError => Err(FetchError::from_status(
                reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                "http://test/datastore_dump",
            )),
            Behavior::NotFound => Err(FetchError::from_status(
                reqwest::StatusCode::NOT_FOUND,
                "http://test/datastore_dump",
            )),
            Behavior::Empty => Err(FetchError::EmptyResult),
            Behavior::Malformed => Err(FetchError::MalformedPayload("garbage".to_string())),
            Behavior::FlakyThenRows(failures, rows) => {
                if attempt <= failures {
                    Err(FetchError::NetworkFailure {
                        message: "connection reset".to_string(),
                        status: None,
                        transient: true,
                    })
                } else {
                    Ok(sample_table(rows))
                }
            }
            Behavior::Panic => panic!("scripted panic for {}", resource),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Writer that records writes without touching the disk
pub(crate) struct MemoryWriter {
    dir: PathBuf,
    fail_for: Vec<String>,
    written: Mutex<Vec<(ResourceId, usize)>>,
}

impl MemoryWriter {
    pub(crate) fn new() -> Self {
        Self {
            dir: PathBuf::from("/memory"),
            fail_for: Vec::new(),
            written: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing_for(mut self, resource: &str) -> Self {
        self.fail_for.push(resource.to_string());
        self
    }

    /// Resources written so far with their row counts
    pub(crate) fn written(&self) -> Vec<(ResourceId, usize)> {
        self.written.lock().unwrap().clone()
    }
}

#[async_trait]
impl TableWriter for MemoryWriter {
    fn artifact_path(&self, resource: &ResourceId) -> PathBuf {
        self.dir.join(format!("{}.parquet", resource))
    }

    async fn write(&self, table: StructuredTable, resource: &ResourceId) -> Result<PathBuf, WriteError> {
        if self.fail_for.iter().any(|r| r == resource.as_str()) {
            return Err(WriteError::IoFailure(std::io::Error::new(
                std::io::ErrorKind::StorageFull,
                "no space left on device",
            )));
        }
        self.written
            .lock()
            .unwrap()
            .push((resource.clone(), table.num_rows()));
        Ok(self.artifact_path(resource))
    }
}

/// Table with a single `_id` column holding `1..=rows`
pub(crate) fn sample_table(rows: usize) -> StructuredTable {
    StructuredTable::new(vec![Column::new(
        "_id",
        ColumnData::Int64((1..=rows as i64).map(Some).collect()),
    )])
    .unwrap()
}

/// Parse a list of identifiers
pub(crate) fn ids(items: &[&str]) -> Vec<ResourceId> {
    items.iter().map(|s| ResourceId::new(s).unwrap()).collect()
}

/// Build a converter around the given fetcher and writer
pub(crate) fn create_test_converter(
    fetcher: Arc<ScriptedFetcher>,
    writer: Arc<MemoryWriter>,
    max_concurrent: usize,
) -> Converter {
    let config = Config {
        max_concurrent_resources: max_concurrent,
        ..Default::default()
    };
    Converter::with_components(config, fetcher, writer).unwrap()
}
