//! In-memory structured table.
//!
//! A [`StructuredTable`] is an ordered list of named, equal-length columns.
//! Each column holds nullable values of a single type. Tables are built from
//! CSV-style text rows or JSON records, with best-effort type inference.

use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

/// Violations of the table invariants
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// A column is longer or shorter than the others
    #[error("column '{column}' has {actual} values, expected {expected}")]
    LengthMismatch {
        /// Offending column
        column: String,
        /// Row count of the table
        expected: usize,
        /// Length of the offending column
        actual: usize,
    },

    /// Two columns share a name
    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),

    /// A text row has a different number of fields than the header
    #[error("row {row} has {actual} fields, expected {expected}")]
    RaggedRow {
        /// 1-based data row number
        row: usize,
        /// Number of header fields
        expected: usize,
        /// Number of fields in the row
        actual: usize,
    },
}

/// Logical type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// 64-bit signed integer
    Int64,
    /// 64-bit float
    Float64,
    /// Boolean
    Boolean,
    /// UTF-8 string
    Utf8,
}

/// Values of one column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// Integer values
    Int64(Vec<Option<i64>>),
    /// Float values
    Float64(Vec<Option<f64>>),
    /// Boolean values
    Boolean(Vec<Option<bool>>),
    /// String values
    Utf8(Vec<Option<String>>),
}

impl ColumnData {
    /// Number of values (including nulls)
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int64(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::Boolean(v) => v.len(),
            ColumnData::Utf8(v) => v.len(),
        }
    }

    /// True when the column has no values
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Logical type
    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnData::Int64(_) => ColumnType::Int64,
            ColumnData::Float64(_) => ColumnType::Float64,
            ColumnData::Boolean(_) => ColumnType::Boolean,
            ColumnData::Utf8(_) => ColumnType::Utf8,
        }
    }

    /// Number of null values
    pub fn null_count(&self) -> usize {
        match self {
            ColumnData::Int64(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Float64(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Boolean(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Utf8(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }
}

/// A named column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Column values
    pub data: ColumnData,
}

impl Column {
    /// Create a column
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Ordered set of named, equal-length columns
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredTable {
    columns: Vec<Column>,
    num_rows: usize,
}

impl StructuredTable {
    /// Build a table, checking that column names are unique and lengths agree
    pub fn new(columns: Vec<Column>) -> Result<Self, TableError> {
        let num_rows = columns.first().map_or(0, |c| c.data.len());

        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(TableError::DuplicateColumn(column.name.clone()));
            }
            if column.data.len() != num_rows {
                return Err(TableError::LengthMismatch {
                    column: column.name.clone(),
                    expected: num_rows,
                    actual: column.data.len(),
                });
            }
        }

        Ok(Self { columns, num_rows })
    }

    /// Build a table from a header row and text rows, inferring column types
    ///
    /// Empty cells and missing-value markers (`NA`, `NaN`, `null`, `N/A`, ...)
    /// become nulls. `inf` and `-inf` stay floats. Every row must have as many
    /// fields as the header.
    pub fn from_text_rows(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, TableError> {
        let width = headers.len();
        let mut cells: Vec<Vec<String>> = (0..width).map(|_| Vec::with_capacity(rows.len())).collect();

        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(TableError::RaggedRow {
                    row: i + 1,
                    expected: width,
                    actual: row.len(),
                });
            }
            for (column, value) in cells.iter_mut().zip(row) {
                column.push(value);
            }
        }

        let columns = headers
            .into_iter()
            .zip(cells)
            .map(|(name, values)| Column::new(name, infer_text_column(values)))
            .collect();

        Self::new(columns)
    }

    /// Build a table from JSON object records, inferring column types
    ///
    /// Columns are the names in `preferred_order` followed by any other keys in
    /// first-seen order. A record without a key contributes a null.
    pub fn from_json_records(
        records: &[serde_json::Map<String, Value>],
        preferred_order: &[String],
    ) -> Result<Self, TableError> {
        let mut names: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for name in preferred_order {
            if seen.insert(name.clone()) {
                names.push(name.clone());
            }
        }
        for record in records {
            for key in record.keys() {
                if !seen.contains(key) {
                    seen.insert(key.clone());
                    names.push(key.clone());
                }
            }
        }

        let columns = names
            .into_iter()
            .map(|name| {
                let values: Vec<Option<&Value>> = records
                    .iter()
                    .map(|r| r.get(&name).filter(|v| !v.is_null()))
                    .collect();
                let data = infer_json_column(&values);
                Column::new(name, data)
            })
            .collect();

        Self::new(columns)
    }

    /// Number of rows
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Number of columns
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// True when the table has no rows
    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// Columns in order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Cell texts read as missing values, matching the usual CSV reader defaults
const NULL_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

fn infer_text_column(values: Vec<String>) -> ColumnData {
    let cells: Vec<Option<String>> = values
        .into_iter()
        .map(|v| if NULL_TOKENS.contains(&v.as_str()) { None } else { Some(v) })
        .collect();

    if cells.iter().all(Option::is_none) {
        return ColumnData::Utf8(cells);
    }

    if let Some(ints) = parse_all(&cells, |s| s.trim().parse::<i64>().ok()) {
        return ColumnData::Int64(ints);
    }
    if let Some(floats) = parse_all(&cells, |s| s.trim().parse::<f64>().ok()) {
        return ColumnData::Float64(floats);
    }
    if let Some(bools) = parse_all(&cells, parse_bool) {
        return ColumnData::Boolean(bools);
    }

    ColumnData::Utf8(cells)
}

/// Parse every non-null cell, or give up on the first failure
fn parse_all<T>(cells: &[Option<String>], parse: impl Fn(&str) -> Option<T>) -> Option<Vec<Option<T>>> {
    cells
        .iter()
        .map(|cell| match cell {
            None => Some(None),
            Some(s) => parse(s).map(Some),
        })
        .collect()
}

fn parse_bool(s: &str) -> Option<bool> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn infer_json_column(values: &[Option<&Value>]) -> ColumnData {
    let present = || values.iter().flatten();

    if present().next().is_none() {
        return ColumnData::Utf8(vec![None; values.len()]);
    }

    if present().all(|v| v.as_i64().is_some()) {
        return ColumnData::Int64(values.iter().map(|v| v.and_then(Value::as_i64)).collect());
    }
    if present().all(|v| v.is_number()) {
        return ColumnData::Float64(values.iter().map(|v| v.and_then(Value::as_f64)).collect());
    }
    if present().all(|v| v.is_boolean()) {
        return ColumnData::Boolean(values.iter().map(|v| v.and_then(Value::as_bool)).collect());
    }

    // Mixed or nested: fall back to text
    ColumnData::Utf8(
        values
            .iter()
            .map(|v| {
                v.map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
            })
            .collect(),
    )
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn records(value: Value) -> Vec<serde_json::Map<String, Value>> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn test_new_rejects_ragged_columns() {
        let err = StructuredTable::new(vec![
            Column::new("a", ColumnData::Int64(vec![Some(1), Some(2)])),
            Column::new("b", ColumnData::Utf8(vec![Some("x".to_string())])),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            TableError::LengthMismatch {
                column: "b".to_string(),
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_new_rejects_duplicate_names() {
        let err = StructuredTable::new(vec![
            Column::new("a", ColumnData::Int64(vec![Some(1)])),
            Column::new("a", ColumnData::Int64(vec![Some(2)])),
        ])
        .unwrap_err();
        assert_eq!(err, TableError::DuplicateColumn("a".to_string()));
    }

    #[test]
    fn test_text_inference() {
        let table = StructuredTable::from_text_rows(
            strings(&["id", "price", "flag", "name", "blank"]),
            vec![
                strings(&["1", "2.5", "true", "Ottawa", ""]),
                strings(&["2", "3", "FALSE", "", ""]),
                strings(&["", "-1e3", "", "Halifax", ""]),
            ],
        )
        .unwrap();

        assert_eq!(table.num_rows(), 3);
        assert_eq!(table.column_names(), vec!["id", "price", "flag", "name", "blank"]);
        assert_eq!(
            table.column("id").unwrap().data,
            ColumnData::Int64(vec![Some(1), Some(2), None])
        );
        assert_eq!(
            table.column("price").unwrap().data,
            ColumnData::Float64(vec![Some(2.5), Some(3.0), Some(-1000.0)])
        );
        assert_eq!(
            table.column("flag").unwrap().data,
            ColumnData::Boolean(vec![Some(true), Some(false), None])
        );
        assert_eq!(
            table.column("name").unwrap().data,
            ColumnData::Utf8(vec![Some("Ottawa".to_string()), None, Some("Halifax".to_string())])
        );
        let blank = &table.column("blank").unwrap().data;
        assert_eq!(blank.column_type(), ColumnType::Utf8);
        assert_eq!(blank.null_count(), 3);
    }

    #[test]
    fn test_text_missing_value_markers_are_null() {
        let table = StructuredTable::from_text_rows(
            strings(&["reading", "ratio", "label"]),
            vec![
                strings(&["NaN", "inf", "NA"]),
                strings(&["4", "0.5", "north"]),
                strings(&["nan", "-inf", "N/A"]),
                strings(&["null", "1", "None"]),
            ],
        )
        .unwrap();

        assert_eq!(
            table.column("reading").unwrap().data,
            ColumnData::Int64(vec![None, Some(4), None, None])
        );
        assert_eq!(
            table.column("ratio").unwrap().data,
            ColumnData::Float64(vec![
                Some(f64::INFINITY),
                Some(0.5),
                Some(f64::NEG_INFINITY),
                Some(1.0)
            ])
        );
        assert_eq!(
            table.column("label").unwrap().data,
            ColumnData::Utf8(vec![None, Some("north".to_string()), None, None])
        );
    }

    #[test]
    fn test_text_mixed_column_stays_string() {
        let table = StructuredTable::from_text_rows(
            strings(&["code"]),
            vec![strings(&["12"]), strings(&["A7"])],
        )
        .unwrap();
        assert_eq!(
            table.column("code").unwrap().data,
            ColumnData::Utf8(vec![Some("12".to_string()), Some("A7".to_string())])
        );
    }

    #[test]
    fn test_text_ragged_row() {
        let err = StructuredTable::from_text_rows(
            strings(&["a", "b"]),
            vec![strings(&["1", "2"]), strings(&["3"])],
        )
        .unwrap_err();
        assert_eq!(
            err,
            TableError::RaggedRow {
                row: 2,
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_json_union_of_keys_in_first_seen_order() {
        let recs = records(json!([
            {"_id": 1, "name": "a"},
            {"_id": 2, "score": 1.5},
            {"_id": 3, "name": "c", "score": 2}
        ]));
        let table = StructuredTable::from_json_records(&recs, &[]).unwrap();

        assert_eq!(table.column_names(), vec!["_id", "name", "score"]);
        assert_eq!(
            table.column("name").unwrap().data,
            ColumnData::Utf8(vec![Some("a".to_string()), None, Some("c".to_string())])
        );
        assert_eq!(
            table.column("score").unwrap().data,
            ColumnData::Float64(vec![None, Some(1.5), Some(2.0)])
        );
    }

    #[test]
    fn test_json_preferred_order_first() {
        let recs = records(json!([{"b": 1, "a": true, "extra": null}]));
        let table =
            StructuredTable::from_json_records(&recs, &["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(table.column_names(), vec!["a", "b", "extra"]);
        assert_eq!(
            table.column("a").unwrap().data,
            ColumnData::Boolean(vec![Some(true)])
        );
        assert_eq!(
            table.column("extra").unwrap().data,
            ColumnData::Utf8(vec![None])
        );
    }

    #[test]
    fn test_json_mixed_types_coerce_to_string() {
        let recs = records(json!([
            {"v": 1},
            {"v": "two"},
            {"v": true},
            {"v": {"nested": [1, 2]}}
        ]));
        let table = StructuredTable::from_json_records(&recs, &[]).unwrap();
        assert_eq!(
            table.column("v").unwrap().data,
            ColumnData::Utf8(vec![
                Some("1".to_string()),
                Some("two".to_string()),
                Some("true".to_string()),
                Some("{\"nested\":[1,2]}".to_string()),
            ])
        );
    }
}
