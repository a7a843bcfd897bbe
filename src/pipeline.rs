// src/pipeline.rs

use anyhow::{Context, Result};
use chrono::Local;
use rayon::prelude::*;
use std::{fs, path::Path};
use tracing::{info, instrument};

use crate::check::{check_year, YearFindings};
use crate::config::PipelineConfig;
use crate::export::{
    render_validation_log, write_panel_csv, write_panel_parquet, write_records,
    write_validation_log,
};
use crate::group::{group_panel, GroupedPanel};
use crate::load::load_year_from;
use crate::normalize::ColumnSpec;
use crate::panel::YearPanel;

pub const PANEL_CSV: &str = "panel.csv";
pub const PANEL_PARQUET: &str = "panel.parquet";
pub const CONSISTENCY_CSV: &str = "consistency.csv";
pub const SEQUENCE_CSV: &str = "sequence.csv";
pub const CELL_ERRORS_CSV: &str = "cell_errors.csv";
pub const VALIDATION_LOG: &str = "validation.log";

/// Loaded rows, their grouping and the checker findings for one year.
#[derive(Debug, Clone)]
pub struct YearOutcome {
    pub panel: YearPanel,
    pub grouped: GroupedPanel,
    pub findings: YearFindings,
}

impl YearOutcome {
    pub fn year(&self) -> u16 {
        self.panel.year
    }
}

/// Load, group and check one year.
#[instrument(level = "info", skip(config))]
pub fn process_year(config: &PipelineConfig, year: u16) -> Result<YearOutcome> {
    let settings = config.year(year);
    let panel = load_year_from(&config.raw_dir, &settings)
        .with_context(|| format!("loading year {}", year))?;
    let grouped = group_panel(&panel, settings.boundary_rule);
    let findings = check_year(&panel, &settings.tolerance);

    info!(
        rows = panel.rows.len(),
        groups = grouped.group_count(),
        dropped = grouped.dropped_groups.len(),
        consistency = findings.consistency.len(),
        sequence = findings.sequence.len(),
        "year processed"
    );
    Ok(YearOutcome {
        panel,
        grouped,
        findings,
    })
}

/// Every configured year, in parallel; results come back in year order.
pub fn process_years(config: &PipelineConfig) -> Result<Vec<YearOutcome>> {
    let mut years = config.years.clone();
    years.sort_unstable();
    years.dedup();

    years
        .par_iter()
        .map(|&year| process_year(config, year))
        .collect()
}

/// Write the panel, the findings and the validation log under `out_dir`.
pub fn write_outputs(outcomes: &[YearOutcome], out_dir: &Path, columns: &[ColumnSpec]) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output dir {}", out_dir.display()))?;

    let grouped: Vec<GroupedPanel> = outcomes.iter().map(|o| o.grouped.clone()).collect();
    write_panel_csv(&out_dir.join(PANEL_CSV), &grouped, columns)?;
    write_panel_parquet(&out_dir.join(PANEL_PARQUET), &grouped, columns)?;

    let consistency: Vec<_> = outcomes
        .iter()
        .flat_map(|o| o.findings.consistency.iter().cloned())
        .collect();
    let sequence: Vec<_> = outcomes
        .iter()
        .flat_map(|o| o.findings.sequence.iter().cloned())
        .collect();
    let cell_errors: Vec<_> = outcomes
        .iter()
        .flat_map(|o| o.panel.cell_errors.iter().cloned())
        .collect();
    write_records(&out_dir.join(CONSISTENCY_CSV), &consistency)?;
    write_records(&out_dir.join(SEQUENCE_CSV), &sequence)?;
    write_records(&out_dir.join(CELL_ERRORS_CSV), &cell_errors)?;

    let entries: Vec<(&YearPanel, &YearFindings)> =
        outcomes.iter().map(|o| (&o.panel, &o.findings)).collect();
    let log = render_validation_log("BPS PANEL VALIDATION REPORT", Local::now(), &entries);
    write_validation_log(&out_dir.join(VALIDATION_LOG), &log)?;
    Ok(())
}
