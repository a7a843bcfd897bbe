// src/check/mod.rs

pub mod consistency;
pub mod sequence;

pub use consistency::{check_row, check_rows, ConsistencyFinding, Tolerance, Tolerances};
pub use sequence::{check_line_numbers, check_panel, SequenceFinding, SequenceIssue};

use crate::panel::YearPanel;

/// Everything the checkers found in one loaded year.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct YearFindings {
    pub consistency: Vec<ConsistencyFinding>,
    pub sequence: Vec<SequenceFinding>,
}

impl YearFindings {
    pub fn is_clean(&self) -> bool {
        self.consistency.is_empty() && self.sequence.is_empty()
    }
}

/// Run the row checks over every loaded row (subtotal rows included) and the
/// numbering checks over every source.
pub fn check_year(panel: &YearPanel, tolerances: &Tolerances) -> YearFindings {
    YearFindings {
        consistency: check_rows(panel.year, &panel.rows, tolerances),
        sequence: check_panel(panel),
    }
}
