//! Semaphore-gated admission of resources and outcome collection.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::{Semaphore, mpsc};

use super::Converter;
use crate::types::{ConversionOutcome, ErrorKind, Event, ResourceId, RunSummary};

/// Current and peak number of pipelines in flight
#[derive(Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Converter {
    /// Convert every resource, at most `max_concurrent_resources` at a time
    ///
    /// This method:
    /// 1. Emits `Queued` for every resource
    /// 2. Acquires a permit per resource (waits while the limit is reached)
    /// 3. Spawns the resource's pipeline holding that permit
    /// 4. Collects each pipeline's outcome through a channel
    ///
    /// Returns exactly one outcome per input resource, in completion order.
    /// Failures, including a panicking pipeline, never affect other resources.
    /// After [`Converter::cancel`], resources not yet admitted are reported as
    /// [`ErrorKind::Cancelled`] while admitted pipelines run to completion.
    pub async fn run(&self, resources: Vec<ResourceId>) -> RunSummary {
        let started_at = Utc::now();
        let total = resources.len();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_resources));
        let in_flight = Arc::new(InFlight::default());

        tracing::info!(
            resources = total,
            max_concurrent = self.config.max_concurrent_resources,
            "Starting conversion run"
        );

        // Capacity covers every outcome, so senders never wait on the collector
        let (outcome_tx, mut outcome_rx) = mpsc::channel::<ConversionOutcome>(total.max(1));
        let collector = tokio::spawn(async move {
            let mut outcomes = Vec::with_capacity(total);
            while let Some(outcome) = outcome_rx.recv().await {
                outcomes.push(outcome);
            }
            outcomes
        });

        for resource in &resources {
            self.emit_event(Event::Queued {
                resource: resource.clone(),
            });
        }

        let mut pending = resources.into_iter();
        while let Some(resource) = pending.next() {
            let permit = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };

            let Some(permit) = permit else {
                let skipped: Vec<ResourceId> =
                    std::iter::once(resource).chain(pending.by_ref()).collect();
                tracing::warn!(
                    skipped = skipped.len(),
                    "Run cancelled, not admitting remaining resources"
                );
                for resource in skipped {
                    let outcome = self.failure(
                        resource,
                        ErrorKind::Cancelled,
                        "run cancelled before admission".to_string(),
                    );
                    outcome_tx.send(outcome).await.ok();
                }
                break;
            };

            let converter = self.clone();
            let outcome_tx = outcome_tx.clone();
            let in_flight = Arc::clone(&in_flight);

            tokio::spawn(async move {
                let _permit = permit;
                in_flight.enter();

                let outcome = AssertUnwindSafe(converter.run_pipeline(resource.clone()))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        let message = panic_message(panic.as_ref());
                        tracing::error!(resource = %resource, error = %message, "Pipeline panicked");
                        converter.failure(
                            resource,
                            ErrorKind::Internal,
                            format!("pipeline panicked: {}", message),
                        )
                    });

                in_flight.exit();
                outcome_tx.send(outcome).await.ok();
            });
        }

        // Collector finishes once every pipeline has dropped its sender
        drop(outcome_tx);
        let outcomes = match collector.await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                tracing::error!(error = %e, "Outcome collector failed");
                Vec::new()
            }
        };

        let summary = RunSummary {
            outcomes,
            started_at,
            finished_at: Utc::now(),
            peak_in_flight: in_flight.peak.load(Ordering::SeqCst),
        };

        tracing::info!(
            total = summary.total(),
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            peak_in_flight = summary.peak_in_flight,
            elapsed_ms = summary.elapsed().num_milliseconds(),
            "Conversion run complete"
        );
        self.emit_event(Event::RunComplete {
            succeeded: summary.succeeded(),
            failed: summary.failed(),
        });

        summary
    }

    /// Build a coordinator-level failure and announce it
    fn failure(&self, resource: ResourceId, kind: ErrorKind, message: String) -> ConversionOutcome {
        self.emit_event(Event::Failed {
            resource: resource.clone(),
            kind,
            error: message.clone(),
        });
        ConversionOutcome::Failure {
            resource,
            kind,
            message,
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
