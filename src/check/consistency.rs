// src/check/consistency.rs

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::normalize::columns::*;
use crate::normalize::Cell;
use crate::panel::PanelRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    Units,
    Valuation,
}

/// An aggregate field and the fields that should add up to it.
#[derive(Debug, Clone, Copy)]
pub struct CheckPair {
    pub name: &'static str,
    pub aggregate: &'static str,
    pub components: &'static [&'static str],
    pub measure: Measure,
}

pub const CHECK_PAIRS: [CheckPair; 4] = [
    CheckPair {
        name: "total_units",
        aggregate: TOTAL_UNITS,
        components: &[PRIVATE_TOTAL, PUBLIC_UNITS],
        measure: Measure::Units,
    },
    CheckPair {
        name: "private_total",
        aggregate: PRIVATE_TOTAL,
        components: &[
            PRIVATE_1_UNIT,
            PRIVATE_2_UNITS,
            PRIVATE_3_4_UNITS,
            PRIVATE_5PLUS_UNITS,
        ],
        measure: Measure::Units,
    },
    CheckPair {
        name: "total_valuation",
        aggregate: TOTAL_VALUATION,
        components: &[PRIVATE_VALUATION, PUBLIC_VALUATION],
        measure: Measure::Valuation,
    },
    CheckPair {
        name: "private_valuation",
        aggregate: PRIVATE_VALUATION,
        components: &[
            PRIVATE_1_UNIT_VAL,
            PRIVATE_2_UNITS_VAL,
            PRIVATE_3_4_UNITS_VAL,
            PRIVATE_5PLUS_UNITS_VAL,
        ],
        measure: Measure::Valuation,
    },
];

/// Allowed slack: `max(absolute, floor(|aggregate| * relative))`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerance {
    pub absolute: f64,
    pub relative: f64,
}

impl Tolerance {
    pub const EXACT: Tolerance = Tolerance {
        absolute: 0.0,
        relative: 0.0,
    };

    pub fn new(absolute: f64, relative: f64) -> Self {
        Self { absolute, relative }
    }

    pub fn allows(&self, aggregate: f64, difference: f64) -> bool {
        let slack = self.absolute.max((aggregate.abs() * self.relative).floor());
        difference.abs() <= slack
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    pub units: Tolerance,
    pub valuation: Tolerance,
}

impl Tolerances {
    pub const EXACT: Tolerances = Tolerances {
        units: Tolerance::EXACT,
        valuation: Tolerance::EXACT,
    };

    /// Off-by-one allowed on every check.
    pub fn strict() -> Self {
        Self {
            units: Tolerance::new(1.0, 0.0),
            valuation: Tolerance::new(1.0, 0.0),
        }
    }

    /// 5 units / 10 thousand dollars, or 1% of the aggregate.
    pub fn lenient() -> Self {
        Self {
            units: Tolerance::new(5.0, 0.01),
            valuation: Tolerance::new(10.0, 0.01),
        }
    }

    pub fn for_measure(&self, measure: Measure) -> Tolerance {
        match measure {
            Measure::Units => self.units,
            Measure::Valuation => self.valuation,
        }
    }
}

/// `aggregate - sum(components)` for one pair of one row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairDifference {
    pub pair: CheckPair,
    pub aggregate: Cell,
    pub component_sum: f64,
    /// Missing whenever the aggregate itself is missing.
    pub difference: Cell,
}

impl PartialEq for CheckPair {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Compute every pair's difference. Missing components count as zero; a
/// missing aggregate gives a missing difference.
pub fn differences(row: &PanelRow) -> Vec<PairDifference> {
    CHECK_PAIRS
        .iter()
        .map(|pair| {
            let aggregate = row.cell(pair.aggregate);
            let component_sum: f64 = pair.components.iter().map(|c| row.cell(c).or_zero()).sum();
            let difference = match aggregate {
                Cell::Value(total) => Cell::Value(total - component_sum),
                Cell::Missing => Cell::Missing,
            };
            PairDifference {
                pair: *pair,
                aggregate,
                component_sum,
                difference,
            }
        })
        .collect()
}

/// A row whose aggregate does not match its components.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyFinding {
    pub year: u16,
    pub source: String,
    pub line_number: String,
    pub name: String,
    pub check: &'static str,
    pub aggregate: f64,
    /// Component cells as printed, "a + b + ...".
    pub components: String,
    pub component_sum: f64,
    pub difference: f64,
}

impl ConsistencyFinding {
    /// "total_units: 120 != 100 + 15 = 115 (diff=+5)" style text for logs.
    pub fn describe(&self) -> String {
        let sign = if self.difference > 0.0 { "+" } else { "" };
        format!(
            "{}: {} != {} = {} (diff={}{})",
            self.check,
            Cell::Value(self.aggregate),
            self.components,
            Cell::Value(self.component_sum),
            sign,
            Cell::Value(self.difference)
        )
    }
}

/// Findings for one row. Never touches the row.
pub fn check_row(year: u16, row: &PanelRow, tolerances: &Tolerances) -> Vec<ConsistencyFinding> {
    differences(row)
        .into_iter()
        .filter_map(|d| {
            let (aggregate, difference) = match (d.aggregate, d.difference) {
                (Cell::Value(a), Cell::Value(diff)) => (a, diff),
                _ => return None,
            };
            if tolerances.for_measure(d.pair.measure).allows(aggregate, difference) {
                return None;
            }
            debug!(
                year,
                row = %row.locator(),
                check = d.pair.name,
                difference,
                "consistency violation"
            );
            Some(ConsistencyFinding {
                year,
                source: row.source.clone(),
                line_number: row.line_number.clone(),
                name: row.name.clone(),
                check: d.pair.name,
                aggregate,
                components: component_text(row, &d.pair),
                component_sum: d.component_sum,
                difference,
            })
        })
        .collect()
}

pub fn check_rows<'a, I>(year: u16, rows: I, tolerances: &Tolerances) -> Vec<ConsistencyFinding>
where
    I: IntoIterator<Item = &'a PanelRow>,
{
    rows.into_iter()
        .flat_map(|row| check_row(year, row, tolerances))
        .collect()
}

fn component_text(row: &PanelRow, pair: &CheckPair) -> String {
    pair.components
        .iter()
        .map(|c| row.cell(c).to_string())
        .collect::<Vec<_>>()
        .join(" + ")
}
