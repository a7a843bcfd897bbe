// src/bin/reconcile_sources.rs
//
// Compare independent extractions of the same table (OCR backends, hand
// entered ground truth) cell by cell and list where they disagree.

use anyhow::{anyhow, Result};
use bpspanel::{
    export::write_records,
    normalize::columns::LINE_NUMBER,
    reconcile::{page_keys, reconcile_all, DuplicateKey, SourceTable},
    CellError, PipelineConfig,
};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone)]
struct SourceArg {
    name: String,
    path: PathBuf,
}

fn parse_source(s: &str) -> Result<SourceArg, String> {
    let (name, path) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=PATH, got `{}`", s))?;
    if name.is_empty() || path.is_empty() {
        return Err(format!("expected NAME=PATH, got `{}`", s));
    }
    Ok(SourceArg {
        name: name.to_string(),
        path: PathBuf::from(path),
    })
}

#[derive(Parser)]
#[command(name = "reconcile_sources")]
#[command(about = "Cell-by-cell comparison of independent extractions")]
struct Args {
    /// NAME=PATH, a CSV file or a directory of page files (repeatable, at least two)
    #[arg(long = "source", value_parser = parse_source, required = true)]
    sources: Vec<SourceArg>,

    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Year whose normalization rules and columns apply
    #[arg(long, default_value_t = bpspanel::config::FIRST_YEAR)]
    year: u16,

    /// Columns that identify a row (repeatable); `page` names the page file
    /// and always leads the key of a page directory
    #[arg(long = "key", default_values_t = [LINE_NUMBER.to_string()])]
    keys: Vec<String>,

    #[arg(long, default_value = "discrepancies.csv")]
    out: PathBuf,

    /// Cells no source could parse
    #[arg(long, default_value = "reconcile_cell_errors.csv")]
    cell_errors: PathBuf,

    /// Row keys a source carried more than once
    #[arg(long, default_value = "reconcile_duplicates.csv")]
    duplicates: PathBuf,
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    let args = Args::parse();
    if args.sources.len() < 2 {
        return Err(anyhow!("need at least two --source values to compare"));
    }
    let config = PipelineConfig::load_or_default(args.config.as_deref())?;
    let settings = config.year(args.year);

    // page directories key on `page`, so every other source has to as well
    let keys = if args.sources.iter().any(|s| s.path.is_dir()) {
        page_keys(&args.keys)
    } else {
        args.keys.clone()
    };
    info!(keys = ?keys, "row keys");

    let tables: Vec<SourceTable> = args
        .sources
        .iter()
        .map(|s| SourceTable::open(&s.name, &s.path, &keys, &settings))
        .collect::<Result<_>>()?;

    let discrepancies = reconcile_all(&tables);
    write_records(&args.out, &discrepancies)?;

    let cell_errors: Vec<CellError> = tables
        .iter()
        .flat_map(|t| t.cell_errors.iter().cloned())
        .collect();
    if !cell_errors.is_empty() {
        warn!(count = cell_errors.len(), "cells could not be parsed");
    }
    write_records(&args.cell_errors, &cell_errors)?;

    let duplicates: Vec<DuplicateKey> = tables.iter().flat_map(|t| t.duplicates()).collect();
    if !duplicates.is_empty() {
        warn!(count = duplicates.len(), "row keys carried more than once were not compared");
    }
    write_records(&args.duplicates, &duplicates)?;

    for d in &discrepancies {
        println!(
            "{} {}: {}={} {}={}",
            d.row, d.field, d.source_a, d.value_a, d.source_b, d.value_b
        );
    }
    info!(
        sources = tables.len(),
        discrepancies = discrepancies.len(),
        out = %args.out.display(),
        "reconciliation finished"
    );
    Ok(())
}
