// src/panel.rs

use serde::Serialize;
use std::{collections::BTreeMap, path::PathBuf};

use crate::normalize::Cell;

/// One normalized table line.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelRow {
    /// Page source the row came from (file stem, e.g. `pages_03_04`).
    pub source: String,
    /// Position of the row inside its source.
    pub position: usize,
    pub line_number: String,
    pub name: String,
    pub cells: BTreeMap<String, Cell>,
}

impl PanelRow {
    /// Cell for `column`; a column the row never carried reads as missing.
    pub fn cell(&self, column: &str) -> Cell {
        self.cells.get(column).copied().unwrap_or(Cell::Missing)
    }

    /// `source:line` locator used in logs and reports.
    pub fn locator(&self) -> String {
        format!("{}:{}", self.source, self.line_number)
    }
}

/// A cell that failed normalization, with enough context to find it on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellError {
    pub year: u16,
    pub source: String,
    pub line_number: String,
    pub column: String,
    pub raw: String,
}

/// What happened to one page source while loading a year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSummary {
    pub source: String,
    pub path: PathBuf,
    pub rows: usize,
    /// Set when the source could not be parsed and was skipped.
    pub unreadable: Option<String>,
}

impl SourceSummary {
    pub fn is_empty(&self) -> bool {
        self.unreadable.is_none() && self.rows == 0
    }
}

/// All rows of one year in source order, never re-sorted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct YearPanel {
    pub year: u16,
    pub rows: Vec<PanelRow>,
    pub sources: Vec<SourceSummary>,
    pub cell_errors: Vec<CellError>,
}

impl YearPanel {
    pub fn new(year: u16) -> Self {
        Self {
            year,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows of one source, in order.
    pub fn source_rows<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a PanelRow> + 'a {
        self.rows.iter().filter(move |r| r.source == source)
    }
}
