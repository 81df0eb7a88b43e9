//! Common test utilities for ckan-dl integration tests

#[allow(dead_code)]
pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::*;

use ckan_dl::{Config, Converter, FetchMode, ResourceId};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

/// CKAN action path for CSV dumps
pub const DUMP_PATH: &str = "/api/3/action/datastore_dump";

/// CKAN action path for paginated search
pub const SEARCH_PATH: &str = "/api/3/action/datastore_search";

/// Build a converter pointed at a mock server, writing into a fresh temp directory
///
/// Returns the converter and the temp directory (which must be kept alive).
#[allow(dead_code)]
pub fn create_test_converter(
    server: &MockServer,
    mode: FetchMode,
    max_concurrent: usize,
    configure: impl FnOnce(&mut Config),
) -> (Converter, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();

    let action = match mode {
        FetchMode::Dump => DUMP_PATH,
        FetchMode::Paginated => SEARCH_PATH,
    };

    let mut config = Config::default();
    config.fetch.mode = mode;
    config.fetch.api_url = Some(format!("{}{}", server.uri(), action));
    config.fetch.request_timeout = Duration::from_secs(5);
    config.output.output_dir = temp_dir.path().join("parquet_files");
    config.max_concurrent_resources = max_concurrent;
    configure(&mut config);

    let converter = Converter::new(config).unwrap();
    (converter, temp_dir)
}

/// Parse identifiers, panicking on invalid input
#[allow(dead_code)]
pub fn ids(items: &[&str]) -> Vec<ResourceId> {
    items.iter().map(|s| ResourceId::new(s).unwrap()).collect()
}
