pub mod check;
pub mod config;
pub mod export;
pub mod group;
pub mod load;
pub mod normalize;
pub mod panel;
pub mod pipeline;
pub mod reconcile;

pub use config::{PipelineConfig, YearSettings};
pub use normalize::{normalize_cell, Cell, ColumnKind, NormalizeError, NormalizeRules};
pub use panel::{CellError, PanelRow, SourceSummary, YearPanel};
