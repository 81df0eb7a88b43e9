//! `ckan-dl` command line entry point.

use ckan_dl::{
    Compression, Config, ConversionOutcome, Converter, Event, FetchMode, IdentifierSource,
    RunSummary, run_with_shutdown,
};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Convert CKAN datastore resources into Parquet files
#[derive(Parser, Debug)]
#[command(
    name = "ckan-dl",
    version,
    about = "Download CKAN datastore resources and store each one as a Parquet file"
)]
struct Cli {
    /// File with one resource id per line, or `-` for stdin
    #[arg(env = "CKAN_DL_IDS", default_value = "published_resource_ids.txt")]
    ids: String,

    /// JSON config file; flags override its values
    #[arg(long, env = "CKAN_DL_CONFIG")]
    config: Option<PathBuf>,

    /// Directory receiving `{id}.parquet` files
    #[arg(long, env = "CKAN_DL_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Maximum number of resources processed at once
    #[arg(long, env = "CKAN_DL_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Transport: `dump` (CSV) or `paginated` (JSON pages)
    #[arg(long, env = "CKAN_DL_MODE")]
    mode: Option<FetchMode>,

    /// Endpoint URL (defaults to open.canada.ca for the selected mode)
    #[arg(long, env = "CKAN_DL_API_URL")]
    api_url: Option<String>,

    /// Records per request in paginated mode
    #[arg(long, env = "CKAN_DL_PAGE_SIZE")]
    page_size: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, env = "CKAN_DL_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Retries for transient network failures (0 disables retrying)
    #[arg(long, env = "CKAN_DL_RETRIES")]
    retries: Option<u32>,

    /// Parquet compression: snappy, zstd, gzip or none
    #[arg(long, env = "CKAN_DL_COMPRESSION")]
    compression: Option<Compression>,

    /// Write the run summary as JSON to this path
    #[arg(long, env = "CKAN_DL_REPORT")]
    report: Option<PathBuf>,
}

impl Cli {
    /// Config file (or defaults) with flag overrides applied
    fn build_config(&self) -> ckan_dl::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(dir) = &self.output_dir {
            config.output.output_dir = dir.clone();
        }
        if let Some(n) = self.concurrency {
            config.max_concurrent_resources = n;
        }
        if let Some(mode) = self.mode {
            config.fetch.mode = mode;
        }
        if let Some(url) = &self.api_url {
            config.fetch.api_url = Some(url.clone());
        }
        if let Some(size) = self.page_size {
            config.fetch.page_size = size;
        }
        if let Some(secs) = self.timeout_secs {
            config.fetch.request_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = self.retries {
            config.retry.max_attempts = retries;
        }
        if let Some(compression) = self.compression {
            config.output.compression = compression;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "ckan-dl failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ckan_dl::Result<()> {
    let config = cli.build_config()?;
    let converter = Converter::new(config)?;
    let ids = IdentifierSource::from_arg(&cli.ids).load().await?;

    if ids.is_empty() {
        tracing::warn!(source = %cli.ids, "No resource identifiers to process");
    }

    let progress = spawn_progress_logger(&converter, ids.len());
    let summary = run_with_shutdown(&converter, ids).await;
    progress.await.ok();

    print_summary(&summary);

    if let Some(path) = &cli.report {
        // Per-resource outcomes are already printed; a report failure does not fail the run
        if let Err(e) = write_report(&summary, path).await {
            tracing::error!(path = %path.display(), error = %e, "Failed to write run report");
        } else {
            tracing::info!(path = %path.display(), "Wrote run report");
        }
    }

    Ok(())
}

/// Log a progress line as each resource finishes
fn spawn_progress_logger(converter: &Converter, total: usize) -> tokio::task::JoinHandle<()> {
    let mut events = converter.subscribe();

    tokio::spawn(async move {
        let mut done = 0usize;
        loop {
            match events.recv().await {
                Ok(Event::Converted { resource, rows, .. }) => {
                    done += 1;
                    tracing::info!(done, total, resource = %resource, rows, "Progress");
                }
                Ok(Event::Failed { resource, kind, .. }) => {
                    done += 1;
                    tracing::info!(done, total, resource = %resource, kind = %kind, "Progress");
                }
                Ok(Event::RunComplete { .. }) => break,
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Progress logger lagged behind");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn print_summary(summary: &RunSummary) {
    for outcome in summary.sorted_by_resource() {
        println!("{}", outcome_line(outcome));
    }
    println!(
        "total={} succeeded={} failed={} elapsed={:.1}s",
        summary.total(),
        summary.succeeded(),
        summary.failed(),
        summary.elapsed().num_milliseconds() as f64 / 1000.0
    );
}

fn outcome_line(outcome: &ConversionOutcome) -> String {
    match outcome {
        ConversionOutcome::Success {
            resource,
            path,
            rows,
        } => format!("{}\tok\t{} rows\t{}", resource, rows, path.display()),
        ConversionOutcome::Failure {
            resource,
            kind,
            message,
        } => format!("{}\t{}\t{}", resource, kind, message),
    }
}

async fn write_report(summary: &RunSummary, path: &Path) -> ckan_dl::Result<()> {
    let json = serde_json::to_vec_pretty(summary)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, json).await?;
    Ok(())
}
