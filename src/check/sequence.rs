// src/check/sequence.rs

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::panel::YearPanel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceIssue {
    InvalidLineNumber,
    Missing,
    Duplicate,
    OutOfOrder,
    EmptySource,
    UnreadableSource,
}

impl SequenceIssue {
    pub fn as_str(&self) -> &'static str {
        match self {
            SequenceIssue::InvalidLineNumber => "invalid line number",
            SequenceIssue::Missing => "missing line numbers",
            SequenceIssue::Duplicate => "duplicate line numbers",
            SequenceIssue::OutOfOrder => "line numbers not in order",
            SequenceIssue::EmptySource => "no rows",
            SequenceIssue::UnreadableSource => "unreadable",
        }
    }
}

/// A structural problem with the line numbering of one page source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceFinding {
    pub year: u16,
    pub source: String,
    pub issue: SequenceIssue,
    pub detail: String,
}

/// A page pair prints a few dozen lines; a number past this many times the
/// row count is an OCR misread, not a gap.
const MAX_LINE_FACTOR: usize = 4;
const MIN_LINE_BOUND: u32 = 100;

/// Check the printed line numbers of one source: every value numeric and in
/// range, the run `1..=max` complete, no repeats, ascending.
pub fn check_line_numbers(year: u16, source: &str, line_numbers: &[&str]) -> Vec<SequenceFinding> {
    let finding = |issue: SequenceIssue, detail: String| SequenceFinding {
        year,
        source: source.to_string(),
        issue,
        detail,
    };

    let mut out = Vec::new();
    let bound = u32::try_from(line_numbers.len().saturating_mul(MAX_LINE_FACTOR))
        .unwrap_or(u32::MAX)
        .max(MIN_LINE_BOUND);
    let mut numbers = Vec::with_capacity(line_numbers.len());
    for raw in line_numbers {
        match raw.trim().parse::<u32>() {
            Ok(n) if n <= bound => numbers.push(n),
            Ok(_) => out.push(finding(
                SequenceIssue::InvalidLineNumber,
                format!("{:?} out of range", raw),
            )),
            Err(_) => out.push(finding(SequenceIssue::InvalidLineNumber, format!("{:?}", raw))),
        }
    }

    let Some(&max) = numbers.iter().max() else {
        return out;
    };

    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for n in &numbers {
        *counts.entry(*n).or_default() += 1;
    }

    let missing: Vec<u32> = (1..=max).filter(|n| !counts.contains_key(n)).collect();
    if !missing.is_empty() {
        out.push(finding(SequenceIssue::Missing, join(&missing)));
    }

    let duplicates: BTreeSet<u32> = counts
        .iter()
        .filter(|(_, c)| **c > 1)
        .map(|(n, _)| *n)
        .collect();
    if !duplicates.is_empty() {
        let dups: Vec<u32> = duplicates.into_iter().collect();
        out.push(finding(SequenceIssue::Duplicate, join(&dups)));
    }

    if numbers.windows(2).any(|w| w[0] > w[1]) {
        out.push(finding(SequenceIssue::OutOfOrder, String::new()));
    }

    out
}

/// Sequence findings for every source of a loaded year, including empty and
/// unreadable sources.
pub fn check_panel(panel: &YearPanel) -> Vec<SequenceFinding> {
    let mut out = Vec::new();
    for summary in &panel.sources {
        if let Some(reason) = &summary.unreadable {
            out.push(SequenceFinding {
                year: panel.year,
                source: summary.source.clone(),
                issue: SequenceIssue::UnreadableSource,
                detail: reason.clone(),
            });
            continue;
        }
        if summary.is_empty() {
            out.push(SequenceFinding {
                year: panel.year,
                source: summary.source.clone(),
                issue: SequenceIssue::EmptySource,
                detail: summary.path.display().to_string(),
            });
            continue;
        }
        let lines: Vec<&str> = panel
            .source_rows(&summary.source)
            .map(|r| r.line_number.as_str())
            .collect();
        out.extend(check_line_numbers(panel.year, &summary.source, &lines));
    }
    out
}

fn join(numbers: &[u32]) -> String {
    numbers
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
