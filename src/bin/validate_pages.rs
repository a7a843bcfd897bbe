// src/bin/validate_pages.rs
//
// Second-look validation of the OCR'd page files: row arithmetic, line
// numbering, empty and unreadable files. Prints the report and writes it next
// to the page files.

use anyhow::{Context, Result};
use bpspanel::{
    check::{check_year, Tolerances, YearFindings},
    export::{render_validation_log, write_validation_log},
    load::load_year_from,
    PipelineConfig, YearPanel,
};
use chrono::Local;
use clap::{Parser, ValueEnum};
use rayon::prelude::*;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_NAME: &str = "second_look_validation.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Use the tolerance from the config (exact unless configured)
    Config,
    /// Exact equality
    Exact,
    /// Off-by-one allowed
    Strict,
    /// max(5 units | 10 valuation, 1% of the aggregate)
    Lenient,
}

#[derive(Parser)]
#[command(name = "validate_pages")]
#[command(about = "Validate extracted page files without building the panel")]
struct Args {
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    raw_dir: Option<PathBuf>,

    #[arg(long = "year")]
    years: Vec<u16>,

    #[arg(long, value_enum, default_value = "config")]
    mode: Mode,

    /// Log path; defaults to <raw_dir>/second_look_validation.log
    #[arg(long)]
    log: Option<PathBuf>,
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = PipelineConfig::load_or_default(args.config.as_deref())?;
    if let Some(dir) = args.raw_dir {
        config.raw_dir = dir;
    }
    if !args.years.is_empty() {
        config.years = args.years;
    }
    let tolerances = match args.mode {
        Mode::Config => config.tolerance,
        Mode::Exact => Tolerances::EXACT,
        Mode::Strict => Tolerances::strict(),
        Mode::Lenient => Tolerances::lenient(),
    };

    let mut years = config.years.clone();
    years.sort_unstable();
    years.dedup();

    let results: Vec<(YearPanel, YearFindings)> = years
        .par_iter()
        .map(|&year| -> Result<(YearPanel, YearFindings)> {
            let panel = load_year_from(&config.raw_dir, &config.year(year))
                .with_context(|| format!("loading year {}", year))?;
            let findings = check_year(&panel, &tolerances);
            Ok((panel, findings))
        })
        .collect::<Result<_>>()?;

    // years with no directory at all stay out of the report
    let entries: Vec<(&YearPanel, &YearFindings)> = results
        .iter()
        .filter(|(p, _)| !p.sources.is_empty())
        .map(|(p, f)| (p, f))
        .collect();

    let title = match args.mode {
        Mode::Exact => "EXACT VALIDATION REPORT",
        Mode::Strict => "STRICT VALIDATION REPORT",
        Mode::Lenient => "LENIENT VALIDATION REPORT",
        Mode::Config => "VALIDATION REPORT",
    };
    let text = render_validation_log(title, Local::now(), &entries);
    print!("{}", text);

    let log_path = args.log.unwrap_or_else(|| config.raw_dir.join(LOG_NAME));
    write_validation_log(&log_path, &text)?;
    println!("\nLog written to: {}", log_path.display());
    info!(years = entries.len(), "validation finished");
    Ok(())
}
