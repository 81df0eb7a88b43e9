//! Single-resource pipeline: fetch, then write.
//!
//! Errors never leave this module; they are classified into a
//! [`ConversionOutcome::Failure`] at the pipeline boundary.

use std::path::PathBuf;

use super::Converter;
use crate::error::ConversionError;
use crate::retry::with_retry;
use crate::types::{ConversionOutcome, Event, ResourceId};

impl Converter {
    /// Fetch one resource and write its artifact
    ///
    /// Does not take a concurrency permit; [`Converter::run`] does that for
    /// batches. Transient fetch failures are retried only when
    /// `retry.max_attempts` is non-zero.
    pub async fn run_pipeline(&self, resource: ResourceId) -> ConversionOutcome {
        self.emit_event(Event::Started {
            resource: resource.clone(),
        });
        tracing::debug!(resource = %resource, fetcher = self.fetcher.name(), "Pipeline started");

        match self.fetch_and_write(&resource).await {
            Ok((path, rows)) => {
                tracing::info!(
                    resource = %resource,
                    path = %path.display(),
                    rows,
                    "Converted resource"
                );
                self.emit_event(Event::Converted {
                    resource: resource.clone(),
                    path: path.clone(),
                    rows,
                });
                ConversionOutcome::Success {
                    resource,
                    path,
                    rows,
                }
            }
            Err(e) => {
                let kind = e.kind();
                tracing::warn!(resource = %resource, kind = %kind, error = %e, "Conversion failed");
                self.emit_event(Event::Failed {
                    resource: resource.clone(),
                    kind,
                    error: e.to_string(),
                });
                ConversionOutcome::Failure {
                    resource,
                    kind,
                    message: e.to_string(),
                }
            }
        }
    }

    async fn fetch_and_write(&self, resource: &ResourceId) -> Result<(PathBuf, usize), ConversionError> {
        let fetcher = &self.fetcher;
        let table = with_retry(&self.config.retry, || fetcher.fetch(resource)).await?;

        let rows = table.num_rows();
        tracing::debug!(resource = %resource, rows, columns = table.num_columns(), "Fetched resource");
        self.emit_event(Event::Fetched {
            resource: resource.clone(),
            rows,
            columns: table.num_columns(),
        });

        let path = self.writer.write(table, resource).await?;
        Ok((path, rows))
    }
}
