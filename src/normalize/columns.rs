// src/normalize/columns.rs

use serde::{Deserialize, Serialize};

use super::ColumnKind;

/// Field names of one BPS table line, as produced by the page extractor.
pub const LINE_NUMBER: &str = "line_number";
pub const SMSA_NAME: &str = "smsa_name";

pub const TOTAL_UNITS: &str = "total_units";
pub const PRIVATE_TOTAL: &str = "private_total";
pub const PRIVATE_1_UNIT: &str = "private_1_unit";
pub const PRIVATE_2_UNITS: &str = "private_2_units";
pub const PRIVATE_3_4_UNITS: &str = "private_3_4_units";
pub const PRIVATE_5PLUS_UNITS: &str = "private_5plus_units";
pub const PUBLIC_UNITS: &str = "public_units";
pub const PRIVATE_STRUCTURES: &str = "private_structures";

pub const TOTAL_VALUATION: &str = "total_valuation";
pub const PRIVATE_VALUATION: &str = "private_valuation";
pub const PRIVATE_1_UNIT_VAL: &str = "private_1_unit_val";
pub const PRIVATE_2_UNITS_VAL: &str = "private_2_units_val";
pub const PRIVATE_3_4_UNITS_VAL: &str = "private_3_4_units_val";
pub const PRIVATE_5PLUS_UNITS_VAL: &str = "private_5plus_units_val";
pub const PUBLIC_VALUATION: &str = "public_valuation";

/// Numeric columns in printed order: the housing-units page, then the
/// valuation page (thousands of dollars).
pub const PERMIT_COLUMNS: [&str; 15] = [
    TOTAL_UNITS,
    PRIVATE_TOTAL,
    PRIVATE_1_UNIT,
    PRIVATE_2_UNITS,
    PRIVATE_3_4_UNITS,
    PRIVATE_5PLUS_UNITS,
    PUBLIC_UNITS,
    PRIVATE_STRUCTURES,
    TOTAL_VALUATION,
    PRIVATE_VALUATION,
    PRIVATE_1_UNIT_VAL,
    PRIVATE_2_UNITS_VAL,
    PRIVATE_3_4_UNITS_VAL,
    PRIVATE_5PLUS_UNITS_VAL,
    PUBLIC_VALUATION,
];

/// One numeric column of a year's layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(default)]
    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub fn integer(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Integer,
        }
    }
}

pub fn default_columns() -> Vec<ColumnSpec> {
    PERMIT_COLUMNS.iter().map(|c| ColumnSpec::integer(*c)).collect()
}

/// Union of several layouts, first occurrence wins, order preserved.
pub fn merge_columns<'a, I>(layouts: I) -> Vec<ColumnSpec>
where
    I: IntoIterator<Item = &'a [ColumnSpec]>,
{
    let mut out: Vec<ColumnSpec> = Vec::new();
    for layout in layouts {
        for col in layout {
            if !out.iter().any(|c| c.name == col.name) {
                out.push(col.clone());
            }
        }
    }
    out
}
