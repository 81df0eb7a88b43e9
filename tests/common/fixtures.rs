//! Payload fixtures shaped like CKAN datastore responses

use serde_json::{Value, json};

/// A small CSV dump with a BOM, quoting, and an empty cell
pub const PROVINCES_CSV: &str = "\u{feff}_id,province,population,capital_is_largest\r\n\
1,Ontario,15608369,false\r\n\
2,\"Nova Scotia\",1058694,true\r\n\
3,Yukon,,false\r\n";

/// A CSV dump with only a header row
pub const HEADER_ONLY_CSV: &str = "_id,province\r\n";

/// Wrap records in a successful `datastore_search` envelope without a `total`
pub fn search_page(records: Vec<Value>) -> Value {
    let mut page = search_page_with_total(records, 0);
    if let Some(result) = page["result"].as_object_mut() {
        result.remove("total");
    }
    page
}

/// Wrap records in a successful `datastore_search` envelope reporting `total`
pub fn search_page_with_total(records: Vec<Value>, total: usize) -> Value {
    json!({
        "help": "https://open.canada.ca/data/api/3/action/help_show?name=datastore_search",
        "success": true,
        "result": {
            "resource_id": "fixture",
            "fields": [
                {"id": "_id", "type": "int"},
                {"id": "name", "type": "text"},
                {"id": "score", "type": "numeric"}
            ],
            "records": records,
            "total": total
        }
    })
}

/// Records `_id = start..start+count` with a name and a score
pub fn numbered_records(start: i64, count: i64) -> Vec<Value> {
    (start..start + count)
        .map(|i| json!({"_id": i, "name": format!("row-{}", i), "score": i as f64 / 2.0}))
        .collect()
}

/// A `datastore_search` failure envelope
pub fn search_error() -> Value {
    json!({
        "success": false,
        "error": {"__type": "Not Found Error", "message": "Not found: Resource was not found."}
    })
}
