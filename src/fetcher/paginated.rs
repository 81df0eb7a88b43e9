//! Paginated JSON transport (`datastore_search`)
//!
//! Pages are requested with `limit` and `offset` until a page comes back empty,
//! or until the offset reaches the `total` the server reports. The offset
//! advances by the number of records actually received, so a server that caps
//! `limit` below the requested page size still yields every row. A server that
//! ignores `offset` and repeats a page is reported as a malformed payload.

use super::{ResourceFetcher, build_client, get_bytes, request_url};
use crate::config::FetchConfig;
use crate::error::{FetchError, Result};
use crate::table::StructuredTable;
use crate::types::ResourceId;
use async_trait::async_trait;
use serde_json::{Map, Value};

type Record = Map<String, Value>;

/// Fetches a resource page by page from a CKAN `datastore_search` endpoint
#[derive(Clone, Debug)]
pub struct PaginatedFetcher {
    client: reqwest::Client,
    endpoint: String,
    page_size: usize,
}

impl PaginatedFetcher {
    /// Create a paginated fetcher for the configured endpoint and page size
    pub fn new(config: &FetchConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            endpoint: config.endpoint().to_string(),
            page_size: config.page_size.max(1),
        })
    }
}

#[async_trait]
impl ResourceFetcher for PaginatedFetcher {
    async fn fetch(&self, resource: &ResourceId) -> std::result::Result<StructuredTable, FetchError> {
        let mut records: Vec<Record> = Vec::new();
        let mut fields: Vec<String> = Vec::new();
        let mut offset = 0usize;
        let mut pages = 0usize;
        let mut previous_len = 0usize;

        loop {
            let url = request_url(
                &self.endpoint,
                &[
                    ("resource_id", resource.to_string()),
                    ("limit", self.page_size.to_string()),
                    ("offset", offset.to_string()),
                ],
            )?;
            tracing::debug!(resource = %resource, offset, limit = self.page_size, "Requesting page");

            let body = get_bytes(&self.client, url).await?;
            let page = parse_page(&body)?;
            pages += 1;

            if fields.is_empty() {
                fields = page.fields;
            }
            if page.records.is_empty() {
                break;
            }
            if previous_len == page.records.len()
                && records[records.len() - previous_len..] == page.records[..]
            {
                return Err(FetchError::MalformedPayload(format!(
                    "server returned the same page again at offset {}",
                    offset
                )));
            }

            previous_len = page.records.len();
            offset += page.records.len();
            records.extend(page.records);

            if matches!(page.total, Some(total) if offset >= total) {
                break;
            }
        }

        tracing::debug!(resource = %resource, pages, rows = records.len(), "Finished paging");

        if records.is_empty() {
            return Err(FetchError::EmptyResult);
        }

        StructuredTable::from_json_records(&records, &fields)
            .map_err(|e| FetchError::MalformedPayload(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "paginated"
    }
}

/// One decoded page
#[derive(Debug, Default)]
pub(crate) struct Page {
    pub(crate) records: Vec<Record>,
    pub(crate) fields: Vec<String>,
    /// Record count across all pages, when the server reports it
    pub(crate) total: Option<usize>,
}

/// Decode a page body: a CKAN envelope (`result.records`) or a bare `records` object
pub(crate) fn parse_page(body: &[u8]) -> std::result::Result<Page, FetchError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| FetchError::MalformedPayload(format!("invalid JSON: {}", e)))?;

    let Value::Object(root) = value else {
        return Err(FetchError::MalformedPayload(
            "expected a JSON object".to_string(),
        ));
    };

    if root.get("success").and_then(Value::as_bool) == Some(false) {
        let detail = root
            .get("error")
            .map(Value::to_string)
            .unwrap_or_else(|| "no error detail".to_string());
        return Err(FetchError::MalformedPayload(format!(
            "API reported failure: {}",
            detail
        )));
    }

    let container = match root.get("result") {
        Some(Value::Object(result)) => result,
        _ => &root,
    };

    let records = match container.get("records") {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(record) => Ok(record.clone()),
                other => Err(FetchError::MalformedPayload(format!(
                    "record {} is not an object: {}",
                    i, other
                ))),
            })
            .collect::<std::result::Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(FetchError::MalformedPayload(
                "'records' is not an array".to_string(),
            ));
        }
        None => {
            return Err(FetchError::MalformedPayload(
                "payload has no 'records' list".to_string(),
            ));
        }
    };

    let fields = container
        .get("fields")
        .and_then(Value::as_array)
        .map(|fields| {
            fields
                .iter()
                .filter_map(|f| f.get("id").and_then(Value::as_str).map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let total = container
        .get("total")
        .and_then(Value::as_u64)
        .and_then(|t| usize::try_from(t).ok());

    Ok(Page {
        records,
        fields,
        total,
    })
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ckan_envelope() {
        let body = br#"{
            "success": true,
            "result": {
                "fields": [{"id": "_id", "type": "int"}, {"id": "name", "type": "text"}],
                "records": [{"_id": 1, "name": "a"}, {"_id": 2, "name": "b"}],
                "total": 2
            }
        }"#;
        let page = parse_page(body).unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.fields, vec!["_id", "name"]);
        assert_eq!(page.total, Some(2));
    }

    #[test]
    fn test_parse_bare_records() {
        let page = parse_page(br#"{"records": []}"#).unwrap();
        assert!(page.records.is_empty());
        assert!(page.fields.is_empty());
        assert_eq!(page.total, None);
    }

    #[test]
    fn test_parse_rejects_bad_payloads() {
        let bodies: [&[u8]; 6] = [
            b"not json",
            br#"[1, 2]"#,
            br#"{"success": false, "error": {"message": "Not found"}}"#,
            br#"{"result": {"records": [1, 2]}}"#,
            br#"{"result": {"records": "nope"}}"#,
            br#"{"result": {}}"#,
        ];
        for body in bodies {
            let err = parse_page(body).unwrap_err();
            assert!(
                matches!(err, FetchError::MalformedPayload(_)),
                "expected malformed payload for {}",
                String::from_utf8_lossy(body)
            );
        }
    }
}
