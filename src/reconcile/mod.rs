// src/reconcile/mod.rs

use serde::Serialize;
use tracing::info;

use crate::normalize::Cell;

pub mod table;

pub use table::{page_keys, DuplicateKey, RowKey, SourceTable, PAGE_KEY};

/// One cell on which two sources disagree. Left for a human to resolve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Discrepancy {
    pub row: RowKey,
    pub field: String,
    pub source_a: String,
    pub value_a: Cell,
    pub source_b: String,
    pub value_b: Cell,
}

/// Compare two sources on the rows and columns they share. A cell is compared
/// only when both sides carry a number; absent and suppressed cells are
/// skipped.
pub fn reconcile(a: &SourceTable, b: &SourceTable) -> Vec<Discrepancy> {
    let shared: Vec<&String> = a.columns.intersection(&b.columns).collect();
    let mut out = Vec::new();

    for (key, a_cells) in &a.rows {
        let Some(b_cells) = b.rows.get(key) else {
            continue;
        };
        for column in &shared {
            let (Some(Cell::Value(va)), Some(Cell::Value(vb))) =
                (a_cells.get(*column), b_cells.get(*column))
            else {
                continue;
            };
            if va != vb {
                out.push(Discrepancy {
                    row: key.clone(),
                    field: column.to_string(),
                    source_a: a.name.clone(),
                    value_a: Cell::Value(*va),
                    source_b: b.name.clone(),
                    value_b: Cell::Value(*vb),
                });
            }
        }
    }

    info!(
        a = %a.name,
        b = %b.name,
        shared_columns = shared.len(),
        discrepancies = out.len(),
        "reconciled"
    );
    out
}

/// Every pair of sources, in the order given.
pub fn reconcile_all(sources: &[SourceTable]) -> Vec<Discrepancy> {
    let mut out = Vec::new();
    for (i, a) in sources.iter().enumerate() {
        for b in &sources[i + 1..] {
            out.extend(reconcile(a, b));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(line: &str) -> RowKey {
        RowKey::from_parts([line])
    }

    #[test]
    fn only_shared_cells_are_compared() {
        let mut a = SourceTable::new("a");
        a.insert(key("1"), "total_units", Cell::Value(100.0));

        let mut b = SourceTable::new("b");
        b.insert(key("1"), "total_units", Cell::Value(101.0));
        b.insert(key("1"), "private_total", Cell::Value(50.0));

        let found = reconcile(&a, &b);
        assert_eq!(
            found,
            vec![Discrepancy {
                row: key("1"),
                field: "total_units".into(),
                source_a: "a".into(),
                value_a: Cell::Value(100.0),
                source_b: "b".into(),
                value_b: Cell::Value(101.0),
            }]
        );
    }

    #[test]
    fn equal_values_and_unmatched_rows_are_silent() {
        let mut a = SourceTable::new("a");
        a.insert(key("1"), "total_units", Cell::Value(7.0));
        a.insert(key("2"), "total_units", Cell::Value(8.0));
        a.insert(key("3"), "private_total", Cell::Value(1.0));

        let mut b = SourceTable::new("b");
        b.insert(key("1"), "total_units", Cell::Value(7.0));
        b.insert(key("3"), "total_units", Cell::Value(9.0));
        b.insert(key("3"), "private_total", Cell::Value(2.0));

        let found = reconcile(&a, &b);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].row, key("3"));
        assert_eq!(found[0].field, "private_total");
        assert_eq!(found[0].value_b, Cell::Value(2.0));
    }

    #[test]
    fn suppressed_cell_is_not_compared() {
        let mut a = SourceTable::new("a");
        a.insert(key("1"), "total_units", Cell::Missing);
        a.insert(key("1"), "public_units", Cell::Missing);

        let mut b = SourceTable::new("b");
        b.insert(key("1"), "total_units", Cell::Value(150.0));
        b.insert(key("1"), "public_units", Cell::Missing);

        assert!(reconcile(&a, &b).is_empty());
    }

    #[test]
    fn mixed_line_numbers_all_compared() {
        let lines = ["2", "10", "1a", "3", "20", "1b", "11", "2a", "100", "9", "9z"];
        let mut a = SourceTable::new("a");
        let mut b = SourceTable::new("b");
        for line in lines {
            a.insert(key(line), "total_units", Cell::Value(1.0));
            b.insert(key(line), "total_units", Cell::Value(2.0));
        }
        assert_eq!(reconcile(&a, &b).len(), lines.len());
    }

    #[test]
    fn all_pairs() {
        let mut a = SourceTable::new("gemini");
        let mut b = SourceTable::new("gpt");
        let mut c = SourceTable::new("truth");
        a.insert(key("1"), "total_units", Cell::Value(1.0));
        b.insert(key("1"), "total_units", Cell::Value(2.0));
        c.insert(key("1"), "total_units", Cell::Value(1.0));

        let found = reconcile_all(&[a, b, c]);
        let pairs: Vec<_> = found
            .iter()
            .map(|d| (d.source_a.as_str(), d.source_b.as_str()))
            .collect();
        assert_eq!(pairs, vec![("gemini", "gpt"), ("gpt", "truth")]);
    }
}
