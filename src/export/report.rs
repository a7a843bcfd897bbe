// src/export/report.rs

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use csv::Writer;
use serde::Serialize;
use std::{collections::BTreeMap, fs, path::Path};
use tracing::info;

use crate::check::{SequenceIssue, YearFindings};
use crate::panel::YearPanel;

/// Serialize any flat record type to CSV, header from the field names.
pub fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<usize> {
    let mut wtr =
        Writer::from_path(path).with_context(|| format!("creating report {}", path.display()))?;
    for rec in records {
        wtr.serialize(rec)
            .with_context(|| format!("writing record to {}", path.display()))?;
    }
    wtr.flush()?;
    info!(path = %path.display(), records = records.len(), "report written");
    Ok(records.len())
}

fn line(out: &mut String, text: impl AsRef<str>) {
    out.push_str(text.as_ref());
    out.push('\n');
}

fn banner(out: &mut String, ch: char, title: &str) {
    let rule: String = std::iter::repeat(ch).take(70).collect();
    out.push('\n');
    line(out, &rule);
    line(out, title);
    line(out, &rule);
}

/// Human-readable validation log: empty and unreadable files, bad cells,
/// consistency errors per file, numbering problems, then a summary.
pub fn render_validation_log(
    title: &str,
    generated: DateTime<Local>,
    years: &[(&YearPanel, &YearFindings)],
) -> String {
    let mut out = String::new();
    let rule: String = "=".repeat(70);
    line(&mut out, &rule);
    line(&mut out, title);
    line(&mut out, format!("generated {}", generated.format("%Y-%m-%d %H:%M:%S")));
    out.push_str(&rule);

    // ---- empty files ------------------------------------------------
    banner(&mut out, '-', "FILES WITH NO ROWS");
    let empty: Vec<String> = years
        .iter()
        .flat_map(|(p, _)| {
            p.sources
                .iter()
                .filter(|s| s.is_empty())
                .map(move |s| format!("{}/{}", p.year, s.source))
        })
        .collect();
    if empty.is_empty() {
        line(&mut out, "  None");
    } else {
        for f in &empty {
            line(&mut out, format!("  {}", f));
        }
        line(&mut out, format!("\nTotal: {} empty file(s)", empty.len()));
    }

    // ---- unreadable files -------------------------------------------
    banner(&mut out, '-', "UNREADABLE FILES");
    let unreadable: Vec<String> = years
        .iter()
        .flat_map(|(p, _)| {
            p.sources.iter().filter_map(move |s| {
                s.unreadable
                    .as_ref()
                    .map(|why| format!("{}/{}: {}", p.year, s.source, why))
            })
        })
        .collect();
    if unreadable.is_empty() {
        line(&mut out, "  None");
    } else {
        for f in &unreadable {
            line(&mut out, format!("  {}", f));
        }
    }

    // ---- cells ------------------------------------------------------
    banner(&mut out, '-', "CELLS THAT FAILED NORMALIZATION");
    let cell_errors: usize = years.iter().map(|(p, _)| p.cell_errors.len()).sum();
    if cell_errors == 0 {
        line(&mut out, "  None");
    }
    for (p, _) in years {
        for e in &p.cell_errors {
            line(
                &mut out,
                format!(
                    "  {}/{} line {} {}: {:?}",
                    e.year, e.source, e.line_number, e.column, e.raw
                ),
            );
        }
    }

    // ---- consistency ------------------------------------------------
    banner(&mut out, '-', "CONSISTENCY ERRORS");
    let mut by_file: BTreeMap<(u16, &str), Vec<String>> = BTreeMap::new();
    for (_, f) in years {
        for c in &f.consistency {
            by_file
                .entry((c.year, c.source.as_str()))
                .or_default()
                .push(format!("Line {} ({}): {}", c.line_number, c.name, c.describe()));
        }
    }
    if by_file.is_empty() {
        line(&mut out, "  None");
    }
    for ((year, source), lines) in &by_file {
        line(&mut out, format!("\n{}/{}:", year, source));
        for l in lines {
            line(&mut out, format!("  {}", l));
        }
    }

    // ---- numbering --------------------------------------------------
    banner(&mut out, '-', "LINE NUMBER SEQUENCE");
    let mut sequence_count = 0usize;
    for (_, f) in years {
        for s in &f.sequence {
            // empty and unreadable files already have their own sections
            if matches!(s.issue, SequenceIssue::EmptySource | SequenceIssue::UnreadableSource) {
                continue;
            }
            sequence_count += 1;
            if s.detail.is_empty() {
                line(&mut out, format!("  {}/{}: {}", s.year, s.source, s.issue.as_str()));
            } else {
                line(
                    &mut out,
                    format!("  {}/{}: {}: {}", s.year, s.source, s.issue.as_str(), s.detail),
                );
            }
        }
    }
    if sequence_count == 0 {
        line(&mut out, "  None");
    }

    // ---- summary ----------------------------------------------------
    let total_files: usize = years.iter().map(|(p, _)| p.sources.len()).sum();
    let total_rows: usize = years.iter().map(|(p, _)| p.rows.len()).sum();
    let consistency_count: usize = years.iter().map(|(_, f)| f.consistency.len()).sum();

    banner(&mut out, '=', "SUMMARY");
    line(&mut out, format!("  Total files scanned: {}", total_files));
    line(&mut out, format!("  Total rows: {}", total_rows));
    line(&mut out, format!("  Empty files: {}", empty.len()));
    line(&mut out, format!("  Unreadable files: {}", unreadable.len()));
    line(&mut out, format!("  Malformed cells: {}", cell_errors));
    line(&mut out, format!("  Files with errors: {}", by_file.len()));
    line(&mut out, format!("  Total validation errors: {}", consistency_count));
    line(&mut out, format!("  Line numbering issues: {}", sequence_count));
    out
}

pub fn write_validation_log(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text).with_context(|| format!("writing log {}", path.display()))?;
    info!(path = %path.display(), "validation log written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{ConsistencyFinding, SequenceFinding};
    use crate::panel::{CellError, SourceSummary};
    use chrono::TimeZone;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn fixture() -> (YearPanel, YearFindings) {
        let mut panel = YearPanel::new(1968);
        panel.sources = vec![
            SourceSummary {
                source: "pages_01_02".into(),
                path: PathBuf::from("raw_ocr/1968/pages_01_02.json"),
                rows: 40,
                unreadable: None,
            },
            SourceSummary {
                source: "pages_03_04".into(),
                path: PathBuf::from("raw_ocr/1968/pages_03_04.json"),
                rows: 0,
                unreadable: None,
            },
        ];
        panel.cell_errors.push(CellError {
            year: 1968,
            source: "pages_01_02".into(),
            line_number: "9".into(),
            column: "public_units".into(),
            raw: "l2".into(),
        });
        let findings = YearFindings {
            consistency: vec![ConsistencyFinding {
                year: 1968,
                source: "pages_01_02".into(),
                line_number: "12".into(),
                name: "AKRON, OHIO".into(),
                check: "total_units",
                aggregate: 120.0,
                components: "100 + 15".into(),
                component_sum: 115.0,
                difference: 5.0,
            }],
            sequence: vec![
                SequenceFinding {
                    year: 1968,
                    source: "pages_01_02".into(),
                    issue: SequenceIssue::Missing,
                    detail: "13".into(),
                },
                SequenceFinding {
                    year: 1968,
                    source: "pages_03_04".into(),
                    issue: SequenceIssue::EmptySource,
                    detail: String::new(),
                },
            ],
        };
        (panel, findings)
    }

    #[test]
    fn log_lists_every_section() {
        let (panel, findings) = fixture();
        let when = Local.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let text = render_validation_log("STRICT VALIDATION REPORT", when, &[(&panel, &findings)]);

        assert!(text.starts_with(&"=".repeat(70)));
        assert!(text.contains("generated 2026-01-02 03:04:05"));
        assert!(text.contains("  1968/pages_03_04\n"));
        assert!(text.contains("1968/pages_01_02 line 9 public_units: \"l2\""));
        assert!(text.contains("Line 12 (AKRON, OHIO): total_units: 120 != 100 + 15 = 115 (diff=+5)"));
        assert!(text.contains("1968/pages_01_02: missing line numbers: 13"));
        assert!(text.contains("Empty files: 1"));
        assert!(text.contains("Total validation errors: 1"));
        assert!(text.contains("Line numbering issues: 1"));
    }

    #[test]
    fn records_round_through_csv_header() {
        let (_, findings) = fixture();
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("consistency.csv");
        write_records(&path, &findings.consistency).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(
            header,
            "year,source,line_number,name,check,aggregate,components,component_sum,difference"
        );
    }
}
