// src/load/page.rs

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::normalize::columns::LINE_NUMBER;

/// One OCR row as the extractor wrote it; every field is still text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawPageRow {
    pub line_number: String,
    pub name: String,
    pub fields: BTreeMap<String, String>,
}

impl RawPageRow {
    /// Field text, or "" when the extractor left the field out.
    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }
}

/// The extractor writes either a bare array of rows or `{"rows": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum PageDocument {
    Rows(Vec<Map<String, Value>>),
    Wrapped { rows: Vec<Map<String, Value>> },
}

/// Parse one page document. Empty or whitespace-only text is an empty page.
pub fn parse_page(text: &str, name_field: &str) -> Result<Vec<RawPageRow>, serde_json::Error> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let records = match serde_json::from_str::<PageDocument>(text)? {
        PageDocument::Rows(rows) | PageDocument::Wrapped { rows } => rows,
    };
    Ok(records
        .into_iter()
        .map(|record| raw_row(record, name_field))
        .collect())
}

fn raw_row(record: Map<String, Value>, name_field: &str) -> RawPageRow {
    let mut row = RawPageRow::default();
    for (key, value) in record {
        let text = value_text(value);
        if key == LINE_NUMBER {
            row.line_number = text.trim().to_string();
        } else if key == name_field {
            row.name = text.trim().to_string();
        } else {
            row.fields.insert(key, text);
        }
    }
    row
}

/// Numbers keep their JSON spelling so they go through the same normalizer as strings.
fn value_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
