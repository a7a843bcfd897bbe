// src/group/mod.rs

use std::collections::BTreeSet;
use tracing::{debug, instrument, warn};

use crate::panel::{PanelRow, YearPanel};

pub mod marker;
pub mod rule;

pub use marker::{Marker, Role};
pub use rule::BoundaryRule;

/// A panel row with its metropolitan-area group and role.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedRow {
    pub row: PanelRow,
    pub group_id: usize,
    pub role: Role,
    pub marker: Marker,
}

/// Every row of a year tagged with (group, role), plus the groups that are
/// TOTAL subtotal artifacts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupedPanel {
    pub year: u16,
    pub rows: Vec<GroupedRow>,
    pub dropped_groups: BTreeSet<usize>,
}

impl GroupedPanel {
    /// Rows of the groups that survive, original order.
    pub fn reduced(&self) -> impl Iterator<Item = &GroupedRow> {
        self.rows
            .iter()
            .filter(move |r| !self.dropped_groups.contains(&r.group_id))
    }

    pub fn into_reduced(self) -> Vec<GroupedRow> {
        let dropped = self.dropped_groups;
        self.rows
            .into_iter()
            .filter(|r| !dropped.contains(&r.group_id))
            .collect()
    }

    pub fn group_count(&self) -> usize {
        self.rows.last().map(|r| r.group_id + 1).unwrap_or(0)
    }
}

/// Group a loaded year.
pub fn group_panel(panel: &YearPanel, rule: BoundaryRule) -> GroupedPanel {
    group_rows(panel.year, panel.rows.clone(), rule)
}

/// Partition ordered rows into groups. Rows must be in printed order.
#[instrument(level = "debug", skip(rows, rule), fields(rows = rows.len(), rule = rule.as_str()))]
pub fn group_rows(year: u16, rows: Vec<PanelRow>, rule: BoundaryRule) -> GroupedPanel {
    let markers: Vec<Marker> = rows.iter().map(|r| Marker::classify(&r.name)).collect();
    let ids = rule.group_ids(&markers);

    let mut out = Vec::with_capacity(rows.len());
    let mut dropped_groups = BTreeSet::new();
    let mut prev_group: Option<usize> = None;
    let mut inside_seen = 0usize;

    for ((row, marker), group_id) in rows.into_iter().zip(markers).zip(ids) {
        let first = prev_group != Some(group_id);
        if first {
            inside_seen = 0;
        }
        prev_group = Some(group_id);

        let role = Role::assign(first, marker);
        if role == Role::InsideCentralCity {
            inside_seen += 1;
            if inside_seen > 1 {
                warn!(
                    year,
                    group_id,
                    row = %row.locator(),
                    "group has more than one inside-central-city row"
                );
            }
        }
        if marker == Marker::Total {
            dropped_groups.insert(group_id);
        }

        out.push(GroupedRow {
            row,
            group_id,
            role,
            marker,
        });
    }

    let grouped = GroupedPanel {
        year,
        rows: out,
        dropped_groups,
    };
    debug!(
        groups = grouped.group_count(),
        dropped = grouped.dropped_groups.len(),
        "grouped"
    );
    grouped
}
