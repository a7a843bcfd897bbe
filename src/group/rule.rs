// src/group/rule.rs

use serde::{Deserialize, Serialize};

use super::marker::Marker;

/// How group boundaries are read off the marker sequence of a year.
///
/// The printed layouts differ between years, so the rule is picked per year
/// from config rather than hard-coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryRule {
    /// Each outside-marker row opens a new group and belongs to it.
    #[default]
    OutsideOpens,
    /// Running count of inside markers, read one row ahead: the row just
    /// above an inside marker opens the group.
    InsideLead,
}

impl BoundaryRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoundaryRule::OutsideOpens => "outside_opens",
            BoundaryRule::InsideLead => "inside_lead",
        }
    }

    /// Group id per row, renumbered densely from 0.
    pub fn group_ids(&self, markers: &[Marker]) -> Vec<usize> {
        let raw = match self {
            BoundaryRule::OutsideOpens => running_count(markers, Marker::Outside),
            BoundaryRule::InsideLead => {
                let counts = running_count(markers, Marker::Inside);
                // a lead has no value for the final row; it keeps its own
                // count and so stays in the group above it
                let last = counts.len().saturating_sub(1);
                (0..counts.len()).map(|i| counts[(i + 1).min(last)]).collect()
            }
        };
        dense(&raw)
    }
}

/// Number of `target` markers seen up to and including each row.
fn running_count(markers: &[Marker], target: Marker) -> Vec<usize> {
    markers
        .iter()
        .scan(0usize, |seen, m| {
            if *m == target {
                *seen += 1;
            }
            Some(*seen)
        })
        .collect()
}

/// Raw ids are non-decreasing; each change starts the next group.
fn dense(raw: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(raw.len());
    let mut current: Option<usize> = None;
    let mut next = 0usize;
    for &id in raw {
        match current {
            Some(c) if c == id => {}
            Some(_) => {
                next += 1;
                current = Some(id);
            }
            None => current = Some(id),
        }
        out.push(next);
    }
    out
}
