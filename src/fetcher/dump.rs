//! Full-table CSV dump transport (`datastore_dump`)

use super::{ResourceFetcher, build_client, get_bytes, request_url};
use crate::config::FetchConfig;
use crate::error::{FetchError, Result};
use crate::table::StructuredTable;
use crate::types::ResourceId;
use async_trait::async_trait;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Fetches a whole resource with one `GET {endpoint}?resource_id={id}` returning CSV
#[derive(Clone, Debug)]
pub struct DumpFetcher {
    client: reqwest::Client,
    endpoint: String,
}

impl DumpFetcher {
    /// Create a dump fetcher for the configured endpoint
    pub fn new(config: &FetchConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            endpoint: config.endpoint().to_string(),
        })
    }
}

#[async_trait]
impl ResourceFetcher for DumpFetcher {
    async fn fetch(&self, resource: &ResourceId) -> std::result::Result<StructuredTable, FetchError> {
        let url = request_url(&self.endpoint, &[("resource_id", resource.to_string())])?;
        tracing::debug!(resource = %resource, url = %url, "Requesting CSV dump");

        let body = get_bytes(&self.client, url).await?;
        tracing::debug!(resource = %resource, bytes = body.len(), "Received CSV dump");

        parse_csv(&body)
    }

    fn name(&self) -> &'static str {
        "dump"
    }
}

/// Parse a CSV body with a header row into a table
pub(crate) fn parse_csv(body: &[u8]) -> std::result::Result<StructuredTable, FetchError> {
    let body = body.strip_prefix(UTF8_BOM).unwrap_or(body);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(body);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| FetchError::MalformedPayload(format!("invalid CSV header: {}", e)))?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.is_empty() {
        return Err(FetchError::MalformedPayload(
            "CSV payload has no header row".to_string(),
        ));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| FetchError::MalformedPayload(format!("invalid CSV row: {}", e)))?;
        rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    if rows.is_empty() {
        return Err(FetchError::EmptyResult);
    }

    StructuredTable::from_text_rows(headers, rows).map_err(|e| FetchError::MalformedPayload(e.to_string()))
}
