//! Bounded-concurrency fetch-and-convert coordinator.
//!
//! The `Converter` struct and its methods are organized by concern:
//! - [`pipeline`] - one resource's fetch, optional retry, and write
//! - [`coordinator`] - semaphore-gated scheduling of many pipelines and outcome collection
//! - [`lifecycle`] - run-wide cancellation

mod coordinator;
mod lifecycle;
mod pipeline;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::error::Result;
use crate::fetcher::{ResourceFetcher, build_fetcher};
use crate::types::Event;
use crate::writer::{ParquetWriter, TableWriter};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Converts CKAN resources into Parquet artifacts (cloneable - all fields are Arc-wrapped)
///
/// # Example
///
/// ```no_run
/// use ckan_dl::{Config, Converter, ResourceId};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let converter = Converter::new(Config::default())?;
///
/// let mut events = converter.subscribe();
/// tokio::spawn(async move {
///     while let Ok(event) = events.recv().await {
///         println!("Event: {:?}", event);
///     }
/// });
///
/// let ids = vec![ResourceId::new("0b6d2b3c-8f1e-4b9a-9d2e-1a2b3c4d5e6f")?];
/// let summary = converter.run(ids).await;
/// println!("{} succeeded, {} failed", summary.succeeded(), summary.failed());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Converter {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Transport used to retrieve resources
    pub(crate) fetcher: Arc<dyn ResourceFetcher>,
    /// Artifact writer
    pub(crate) writer: Arc<dyn TableWriter>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Stops admission of new resources when cancelled
    pub(crate) cancel_token: CancellationToken,
}

impl Converter {
    /// Create a converter using the fetcher selected by `config.mode` and a Parquet writer
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let fetcher = build_fetcher(&config.fetch)?;
        let writer: Arc<dyn TableWriter> = Arc::new(ParquetWriter::from_config(&config.output));

        tracing::info!(
            fetcher = fetcher.name(),
            endpoint = config.fetch.endpoint(),
            output_dir = %config.output_dir().display(),
            max_concurrent = config.max_concurrent_resources,
            "Converter initialized"
        );

        Self::with_components(config, fetcher, writer)
    }

    /// Create a converter with caller-supplied fetcher and writer
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_components(
        config: Config,
        fetcher: Arc<dyn ResourceFetcher>,
        writer: Arc<dyn TableWriter>,
    ) -> Result<Self> {
        config.validate()?;
        let (event_tx, _rx) = tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config: Arc::new(config),
            fetcher,
            writer,
            event_tx,
            cancel_token: CancellationToken::new(),
        })
    }

    /// Subscribe to converter events
    ///
    /// Each subscriber receives every event emitted after it subscribed. A
    /// subscriber that falls more than the channel capacity behind gets
    /// `RecvError::Lagged` and skips ahead.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub(crate) fn emit_event(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine - we just drop the event
        self.event_tx.send(event).ok();
    }
}
