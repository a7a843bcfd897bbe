// src/load/mod.rs

use glob::glob;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::YearSettings;
use crate::normalize::{normalize_cell, Cell, NormalizeError};
use crate::panel::{CellError, PanelRow, SourceSummary, YearPanel};

pub mod page;

pub use page::{parse_page, RawPageRow};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("page source {} unreadable: {reason}", .path.display())]
    SourceUnreadable { path: PathBuf, reason: String },
    #[error("bad source pattern {pattern}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// What to do with a page source that is not structured data at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnreadablePolicy {
    /// Fail the whole year.
    Abort,
    /// Warn, record the source as unreadable, carry on.
    #[default]
    Skip,
}

/// Page sources of `year` under `root`, sorted by file name so page order is
/// reproducible (`pages_01_02.json`, `pages_03_04.json`, ...).
pub fn discover_sources(root: &Path, year: u16) -> Result<Vec<PathBuf>, LoadError> {
    discover_in(&root.join(year.to_string()))
}

/// Sorted `*.json` files directly inside `dir`.
pub fn discover_in(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let pattern = format!("{}/*.json", dir.display());
    let mut paths: Vec<PathBuf> = glob(&pattern)
        .map_err(|source| LoadError::Pattern {
            pattern: pattern.clone(),
            source,
        })?
        .filter_map(Result::ok)
        .collect();
    paths.sort();
    if paths.is_empty() {
        warn!(dir = %dir.display(), "no page sources found");
    }
    Ok(paths)
}

/// Read one page source.
pub fn read_page(path: &Path, name_field: &str) -> Result<Vec<RawPageRow>, LoadError> {
    let unreadable = |reason: String| LoadError::SourceUnreadable {
        path: path.to_path_buf(),
        reason,
    };
    let text = fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
    parse_page(&text, name_field).map_err(|e| unreadable(e.to_string()))
}

/// File stem used as the source id in panels and reports.
pub fn source_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Normalize every configured column of one raw row. Bad cells are pushed to
/// `errors` and stored as missing; the rest of the row is unaffected.
pub fn normalize_row(
    raw: RawPageRow,
    source: &str,
    position: usize,
    settings: &YearSettings,
    errors: &mut Vec<CellError>,
) -> PanelRow {
    let mut cells = BTreeMap::new();
    for col in &settings.columns {
        let text = raw.field(&col.name);
        let cell = match normalize_cell(text, col.kind, &settings.rules) {
            Ok(cell) => cell,
            Err(NormalizeError::MalformedNumericToken { raw: token }) => {
                debug!(
                    year = settings.year,
                    source,
                    line = %raw.line_number,
                    column = %col.name,
                    raw = %token,
                    "malformed numeric token"
                );
                errors.push(CellError {
                    year: settings.year,
                    source: source.to_string(),
                    line_number: raw.line_number.clone(),
                    column: col.name.clone(),
                    raw: token,
                });
                Cell::Missing
            }
        };
        cells.insert(col.name.clone(), cell);
    }
    PanelRow {
        source: source.to_string(),
        position,
        line_number: raw.line_number,
        name: raw.name,
        cells,
    }
}

/// Load, normalize and concatenate the page sources of one year, in the
/// given order.
#[instrument(level = "info", skip(settings, sources), fields(year = settings.year, sources = sources.len()))]
pub fn load_year(settings: &YearSettings, sources: &[PathBuf]) -> Result<YearPanel, LoadError> {
    let mut panel = YearPanel::new(settings.year);

    for path in sources {
        let source = source_name(path);
        let raw_rows = match read_page(path, &settings.name_field) {
            Ok(rows) => rows,
            Err(err) => match settings.on_unreadable {
                UnreadablePolicy::Abort => return Err(err),
                UnreadablePolicy::Skip => {
                    warn!(source = %source, error = %err, "skipping unreadable page source");
                    panel.sources.push(SourceSummary {
                        source,
                        path: path.clone(),
                        rows: 0,
                        unreadable: Some(err.to_string()),
                    });
                    continue;
                }
            },
        };

        if raw_rows.is_empty() {
            warn!(source = %source, "page source has no rows");
        }
        panel.sources.push(SourceSummary {
            source: source.clone(),
            path: path.clone(),
            rows: raw_rows.len(),
            unreadable: None,
        });

        for (position, raw) in raw_rows.into_iter().enumerate() {
            let row = normalize_row(raw, &source, position, settings, &mut panel.cell_errors);
            panel.rows.push(row);
        }
    }

    info!(
        rows = panel.rows.len(),
        cell_errors = panel.cell_errors.len(),
        "year loaded"
    );
    Ok(panel)
}

/// `discover_sources` + `load_year`.
pub fn load_year_from(root: &Path, settings: &YearSettings) -> Result<YearPanel, LoadError> {
    let sources = discover_sources(root, settings.year)?;
    load_year(settings, &sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn concatenates_in_source_order() {
        let tmp = tempdir().unwrap();
        let year_dir = tmp.path().join("1967");
        fs::create_dir_all(&year_dir).unwrap();
        write(
            &year_dir,
            "pages_03_04.json",
            r#"[{"line_number": "3", "smsa_name": "AKRON, OHIO", "total_units": "20"}]"#,
        );
        write(
            &year_dir,
            "pages_01_02.json",
            r#"{"rows": [
                {"line_number": "1", "smsa_name": "ABILENE, TEX.", "total_units": "1 0"},
                {"line_number": "2", "smsa_name": "INSIDE CENTRAL CITY", "total_units": "-"}
            ]}"#,
        );

        let settings = YearSettings::standard(1967);
        let panel = load_year_from(tmp.path(), &settings).unwrap();
        let lines: Vec<_> = panel.rows.iter().map(|r| r.line_number.as_str()).collect();
        assert_eq!(lines, vec!["1", "2", "3"]);
        assert_eq!(panel.rows[0].cell("total_units"), Cell::Value(10.0));
        assert_eq!(panel.rows[1].cell("total_units"), Cell::Value(0.0));
        assert_eq!(panel.rows[1].position, 1);
        assert_eq!(panel.rows[2].source, "pages_03_04");
        assert_eq!(panel.rows[2].position, 0);
        // absent fields read as missing, not zero
        assert_eq!(panel.rows[2].cell("public_units"), Cell::Missing);
        assert!(panel.cell_errors.is_empty());
    }

    #[test]
    fn bad_cell_is_collected_not_fatal() {
        let tmp = tempdir().unwrap();
        let path = write(
            tmp.path(),
            "pages_01_02.json",
            r#"[{"line_number": "4", "smsa_name": "ALBANY", "total_units": "1O4", "private_total": "99"}]"#,
        );
        let settings = YearSettings::standard(1970);
        let panel = load_year(&settings, &[path]).unwrap();
        assert_eq!(panel.rows.len(), 1);
        assert_eq!(panel.rows[0].cell("total_units"), Cell::Missing);
        assert_eq!(panel.rows[0].cell("private_total"), Cell::Value(99.0));
        assert_eq!(
            panel.cell_errors,
            vec![CellError {
                year: 1970,
                source: "pages_01_02".into(),
                line_number: "4".into(),
                column: "total_units".into(),
                raw: "1O4".into(),
            }]
        );
    }

    #[test]
    fn empty_sources_are_tolerated() {
        let tmp = tempdir().unwrap();
        let a = write(tmp.path(), "pages_01_02.json", "[]");
        let b = write(tmp.path(), "pages_03_04.json", "");
        let settings = YearSettings::standard(1975);
        let panel = load_year(&settings, &[a, b]).unwrap();
        assert!(panel.is_empty());
        assert_eq!(panel.sources.len(), 2);
        assert!(panel.sources.iter().all(|s| s.is_empty()));
    }

    #[test]
    fn unreadable_source_follows_policy() {
        let tmp = tempdir().unwrap();
        let good = write(
            tmp.path(),
            "pages_01_02.json",
            r#"[{"line_number": "1", "smsa_name": "ABILENE, TEX."}]"#,
        );
        let bad = write(tmp.path(), "pages_03_04.json", "{ not json");

        let mut settings = YearSettings::standard(1969);
        let panel = load_year(&settings, &[good.clone(), bad.clone()]).unwrap();
        assert_eq!(panel.rows.len(), 1);
        assert!(panel.sources[1].unreadable.is_some());

        settings.on_unreadable = UnreadablePolicy::Abort;
        let err = load_year(&settings, &[good, bad]).unwrap_err();
        assert!(matches!(err, LoadError::SourceUnreadable { .. }));
    }

    #[test]
    fn missing_year_dir_is_empty() {
        let tmp = tempdir().unwrap();
        let sources = discover_sources(tmp.path(), 1977).unwrap();
        assert!(sources.is_empty());
    }
}
