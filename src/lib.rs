//! # ckan-dl
//!
//! Bulk downloader that converts CKAN datastore resources into Parquet files.
//!
//! ## Design Philosophy
//!
//! ckan-dl is designed to be:
//! - **Failure-isolating** - One bad resource never aborts the batch
//! - **Bounded** - At most `max_concurrent_resources` requests in flight
//! - **Sensible defaults** - Works against open.canada.ca out of the box
//! - **Event-driven** - Consumers subscribe to progress events
//!
//! ## Quick Start
//!
//! ```no_run
//! use ckan_dl::{Config, Converter, IdentifierSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         max_concurrent_resources: 8,
//!         ..Default::default()
//!     };
//!
//!     let converter = Converter::new(config)?;
//!     let ids = IdentifierSource::File("published_resource_ids.txt".into())
//!         .load()
//!         .await?;
//!
//!     let summary = converter.run(ids).await;
//!     for outcome in summary.sorted_by_resource() {
//!         println!("{:?}", outcome);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// In-memory table to Arrow conversion
pub mod columnar;
/// Configuration types
pub mod config;
/// Bounded-concurrency coordinator (decomposed into focused submodules)
pub mod converter;
/// Error types
pub mod error;
/// Resource fetchers (CSV dump and paginated JSON)
pub mod fetcher;
/// Retry logic with exponential backoff
pub mod retry;
/// Identifier sources
pub mod source;
/// In-memory structured tables
pub mod table;
/// Core types and events
pub mod types;
/// Parquet artifact writer
pub mod writer;

// Re-export commonly used types
pub use config::{Compression, Config, FetchMode};
pub use converter::Converter;
pub use error::{ConversionError, Error, FetchError, Result, WriteError};
pub use fetcher::{DumpFetcher, PaginatedFetcher, ResourceFetcher};
pub use source::IdentifierSource;
pub use table::StructuredTable;
pub use types::{ConversionOutcome, ErrorKind, Event, PipelineState, ResourceId, RunSummary};
pub use writer::{ParquetWriter, TableWriter, read_artifact};

/// Run a batch, cancelling admission when a termination signal arrives.
///
/// In-flight pipelines drain; resources never admitted are reported as
/// cancelled, so the summary still holds one outcome per resource.
///
/// On Unix both SIGTERM and SIGINT trigger cancellation; elsewhere Ctrl+C does.
///
/// # Example
///
/// ```no_run
/// use ckan_dl::{Config, Converter, ResourceId, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let converter = Converter::new(Config::default())?;
///     let ids = vec![ResourceId::new("0b6d2b3c-8f1e-4b9a-9d2e-1a2b3c4d5e6f")?];
///
///     let summary = run_with_shutdown(&converter, ids).await;
///     println!("{} failed", summary.failed());
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(converter: &Converter, resources: Vec<ResourceId>) -> RunSummary {
    let watcher = converter.clone();
    let signal_task = tokio::spawn(async move {
        wait_for_signal().await;
        watcher.cancel();
    });

    let summary = converter.run(resources).await;
    signal_task.abort();
    summary
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in sandboxes; fall back to ctrl_c in that case
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            let name = tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
            };
            tracing::info!(signal = name, "Shutdown requested, no new resources will start");
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Signal registration failed, listening for Ctrl+C only");
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown requested, no new resources will start");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown requested, no new resources will start"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}
