// src/reconcile/table.rs

use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, Trim};
use serde::Serialize;
use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
    fmt,
    fs::File,
    io,
    path::Path,
};
use tracing::{info, warn};

use crate::config::YearSettings;
use crate::load::{discover_in, read_page, source_name, RawPageRow, UnreadablePolicy};
use crate::normalize::{columns::LINE_NUMBER, normalize_cell, strip_whitespace, Cell, ColumnSpec};
use crate::panel::CellError;

/// Key column that page-file sources expose for the page a row came from.
pub const PAGE_KEY: &str = "page";

/// Row identifier built from one or more key columns, joined with `|`.
/// Parts order by their leading number, so line 2 sorts before line 10.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RowKey(String);

impl RowKey {
    pub fn from_parts<'a, I>(parts: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        RowKey(
            parts
                .into_iter()
                .map(strip_whitespace)
                .collect::<Vec<_>>()
                .join("|"),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sort key of one key part: parts with a leading number first, by that
/// number, then by text ("2" < "2A" < "10"); other text after, by text.
fn part_order(part: &str) -> (bool, u64, &str) {
    let digits = part.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return (true, 0, part);
    }
    let n = part[..digits].parse::<u64>().unwrap_or(u64::MAX);
    (false, n, part)
}

impl Ord for RowKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .split('|')
            .map(part_order)
            .cmp(other.0.split('|').map(part_order))
    }
}

impl PartialOrd for RowKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One extraction source (an OCR backend, or hand-entered ground truth)
/// keyed by row and field. Cells are normalized with the same rules as the
/// panel. A cell that is not in `rows` was not reported by this source.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceTable {
    pub name: String,
    pub columns: BTreeSet<String>,
    pub rows: BTreeMap<RowKey, BTreeMap<String, Cell>>,
    pub cell_errors: Vec<CellError>,
    /// Keys carried by more than one row. Those rows are ambiguous and are
    /// left out of `rows`.
    pub duplicate_keys: BTreeSet<RowKey>,
}

/// A key this source carried more than once, for the duplicates report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateKey {
    pub source: String,
    pub row: RowKey,
}

impl SourceTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Insert an already-normalized cell.
    pub fn insert(&mut self, key: RowKey, column: &str, cell: Cell) {
        self.columns.insert(column.to_string());
        self.rows
            .entry(key)
            .or_default()
            .insert(column.to_string(), cell);
    }

    pub fn get(&self, key: &RowKey, column: &str) -> Option<Cell> {
        self.rows.get(key).and_then(|r| r.get(column)).copied()
    }

    pub fn duplicates(&self) -> impl Iterator<Item = DuplicateKey> + '_ {
        self.duplicate_keys.iter().map(|row| DuplicateKey {
            source: self.name.clone(),
            row: row.clone(),
        })
    }

    /// Note `key` as loaded; false if an earlier row already had it.
    fn see(&mut self, seen: &mut BTreeSet<RowKey>, key: &RowKey) -> bool {
        if seen.insert(key.clone()) {
            return true;
        }
        warn!(source = %self.name, row = %key, "duplicate row key, row left out of comparison");
        self.duplicate_keys.insert(key.clone());
        false
    }

    fn drop_duplicates(&mut self) {
        for key in &self.duplicate_keys {
            self.rows.remove(key);
        }
    }

    /// Normalize `raw` and insert it; a malformed token is recorded and the
    /// cell left out of the comparison.
    fn insert_raw(&mut self, key: &RowKey, col: &ColumnSpec, raw: &str, settings: &YearSettings) {
        match normalize_cell(raw, col.kind, &settings.rules) {
            Ok(cell) => {
                self.rows
                    .entry(key.clone())
                    .or_default()
                    .insert(col.name.clone(), cell);
            }
            Err(err) => {
                warn!(source = %self.name, row = %key, column = %col.name, error = %err, "cell left out of comparison");
                self.cell_errors.push(CellError {
                    year: settings.year,
                    source: self.name.clone(),
                    line_number: key.to_string(),
                    column: col.name.clone(),
                    raw: raw.to_string(),
                });
            }
        }
    }

    /// Read a delimited table with a header row. Only the configured numeric
    /// columns are kept; blank cells count as not reported, which is how a
    /// partial ground-truth file leaves fields out.
    pub fn from_csv<R: io::Read>(
        name: &str,
        reader: R,
        key_columns: &[String],
        settings: &YearSettings,
    ) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .flexible(true)
            .trim(Trim::Headers)
            .from_reader(reader);
        let headers = rdr
            .headers()
            .with_context(|| format!("{}: reading header", name))?
            .clone();

        let key_idx: Vec<usize> = key_columns
            .iter()
            .map(|k| {
                headers
                    .iter()
                    .position(|h| h == k.as_str())
                    .ok_or_else(|| anyhow!("{}: key column `{}` not in header", name, k))
            })
            .collect::<Result<_>>()?;
        let value_idx: Vec<(usize, &ColumnSpec)> = settings
            .columns
            .iter()
            .filter(|c| !key_columns.contains(&c.name))
            .filter_map(|c| headers.iter().position(|h| h == c.name).map(|i| (i, c)))
            .collect();

        let mut table = SourceTable::new(name);
        table.columns = value_idx.iter().map(|(_, c)| c.name.clone()).collect();
        let mut seen = BTreeSet::new();

        for (n, record) in rdr.records().enumerate() {
            let record = record.with_context(|| format!("{}: reading record {}", name, n + 1))?;
            let key = RowKey::from_parts(key_idx.iter().map(|&i| record.get(i).unwrap_or("")));
            if !table.see(&mut seen, &key) {
                continue;
            }
            for (i, col) in &value_idx {
                let text = record.get(*i).unwrap_or("");
                if text.trim().is_empty() {
                    continue;
                }
                table.insert_raw(&key, col, text, settings);
            }
        }
        table.drop_duplicates();

        info!(
            source = name,
            rows = table.rows.len(),
            columns = table.columns.len(),
            duplicates = table.duplicate_keys.len(),
            "table loaded"
        );
        Ok(table)
    }

    pub fn from_csv_path(
        name: &str,
        path: &Path,
        key_columns: &[String],
        settings: &YearSettings,
    ) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Self::from_csv(name, file, key_columns, settings)
    }

    /// Build a table from a directory of page JSON files. Besides the record
    /// fields, each row exposes `page` (the file stem) as a key column.
    /// Line numbers restart on every page, so `page` leads the key whenever
    /// the caller did not place it.
    pub fn from_pages(
        name: &str,
        dir: &Path,
        key_columns: &[String],
        settings: &YearSettings,
    ) -> Result<Self> {
        let key_columns = page_keys(key_columns);
        let mut table = SourceTable::new(name);
        table.columns = settings.columns.iter().map(|c| c.name.clone()).collect();
        let mut seen = BTreeSet::new();

        for path in discover_in(dir)? {
            let page = source_name(&path);
            let raw_rows = match read_page(&path, &settings.name_field) {
                Ok(rows) => rows,
                Err(err) if settings.on_unreadable == UnreadablePolicy::Skip => {
                    warn!(source = name, error = %err, "skipping unreadable page source");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            for raw in &raw_rows {
                let key = RowKey::from_parts(
                    key_columns
                        .iter()
                        .map(|k| key_value(raw, &page, k, &settings.name_field)),
                );
                if !table.see(&mut seen, &key) {
                    continue;
                }
                for col in &settings.columns {
                    if let Some(text) = raw.fields.get(&col.name) {
                        table.insert_raw(&key, col, text, settings);
                    }
                }
            }
        }
        table.drop_duplicates();

        info!(
            source = name,
            rows = table.rows.len(),
            duplicates = table.duplicate_keys.len(),
            "page source loaded"
        );
        Ok(table)
    }

    /// A CSV file or a directory of page files, chosen by what `path` is.
    pub fn open(
        name: &str,
        path: &Path,
        key_columns: &[String],
        settings: &YearSettings,
    ) -> Result<Self> {
        if path.is_dir() {
            Self::from_pages(name, path, key_columns, settings)
        } else {
            Self::from_csv_path(name, path, key_columns, settings)
        }
    }
}

/// `key_columns` with `page` in front unless already present.
pub fn page_keys(key_columns: &[String]) -> Vec<String> {
    if key_columns.iter().any(|k| k == PAGE_KEY) {
        return key_columns.to_vec();
    }
    std::iter::once(PAGE_KEY.to_string())
        .chain(key_columns.iter().cloned())
        .collect()
}

fn key_value<'a>(raw: &'a RawPageRow, page: &'a str, key: &str, name_field: &str) -> &'a str {
    if key == PAGE_KEY {
        page
    } else if key == LINE_NUMBER {
        &raw.line_number
    } else if key == name_field {
        &raw.name
    } else {
        raw.field(key)
    }
}
