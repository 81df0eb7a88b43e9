//! Resource fetchers
//!
//! A [`ResourceFetcher`] turns one resource identifier into a [`StructuredTable`].
//! Two transports are provided:
//! - [`DumpFetcher`] - a single `datastore_dump` request returning CSV
//! - [`PaginatedFetcher`] - repeated `datastore_search` requests returning JSON records
//!
//! Fetchers never retry; the converter decides whether a failure is worth another try.

use crate::config::{FetchConfig, FetchMode};
use crate::error::{Error, FetchError, Result};
use crate::table::StructuredTable;
use crate::types::ResourceId;
use async_trait::async_trait;
use std::sync::Arc;

mod dump;
mod paginated;

pub use dump::DumpFetcher;
pub use paginated::PaginatedFetcher;

/// Retrieves a resource's tabular payload
///
/// # Examples
///
/// ```no_run
/// use ckan_dl::config::FetchConfig;
/// use ckan_dl::fetcher::{DumpFetcher, ResourceFetcher};
/// use ckan_dl::types::ResourceId;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = DumpFetcher::new(&FetchConfig::default())?;
/// let id = ResourceId::new("0b6d2b3c-8f1e-4b9a-9d2e-1a2b3c4d5e6f")?;
/// let table = fetcher.fetch(&id).await?;
/// println!("{} rows, {} columns", table.num_rows(), table.num_columns());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Fetch one resource and parse it into a table
    ///
    /// # Errors
    ///
    /// - [`FetchError::NetworkFailure`] on transport errors and non-2xx responses
    /// - [`FetchError::MalformedPayload`] when the body cannot be parsed into rows
    /// - [`FetchError::EmptyResult`] when the resource has no records
    async fn fetch(&self, resource: &ResourceId) -> std::result::Result<StructuredTable, FetchError>;

    /// Short name of the transport, for logging
    fn name(&self) -> &'static str;
}

/// Build the HTTP client shared by all requests of a fetcher
pub fn build_client(config: &FetchConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.request_timeout)
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))
}

/// Build the fetcher selected by `config.mode`
pub fn build_fetcher(config: &FetchConfig) -> Result<Arc<dyn ResourceFetcher>> {
    let fetcher: Arc<dyn ResourceFetcher> = match config.mode {
        FetchMode::Dump => Arc::new(DumpFetcher::new(config)?),
        FetchMode::Paginated => Arc::new(PaginatedFetcher::new(config)?),
    };
    Ok(fetcher)
}

/// Build a request URL from the endpoint and query parameters
fn request_url(endpoint: &str, params: &[(&str, String)]) -> std::result::Result<url::Url, FetchError> {
    url::Url::parse_with_params(endpoint, params).map_err(|e| FetchError::NetworkFailure {
        message: format!("invalid endpoint '{}': {}", endpoint, e),
        status: None,
        transient: false,
    })
}

/// GET a URL and return the body, mapping non-2xx statuses to failures
async fn get_bytes(
    client: &reqwest::Client,
    url: url::Url,
) -> std::result::Result<Vec<u8>, FetchError> {
    let url_str = url.to_string();

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(e, &url_str))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::from_status(status, &url_str));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| FetchError::from_reqwest(e, &url_str))?;
    Ok(body.to_vec())
}
