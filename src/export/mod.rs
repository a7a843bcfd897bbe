// src/export/mod.rs

pub mod panel;
pub mod report;

pub use panel::{panel_batch, write_panel_csv, write_panel_parquet};
pub use report::{render_validation_log, write_records, write_validation_log};
