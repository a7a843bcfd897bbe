use anyhow::Result;
use bpspanel::{
    pipeline::{process_years, write_outputs},
    PipelineConfig,
};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Build the metropolitan-area permit panel from OCR'd page files.
#[derive(Parser)]
#[command(name = "bpspanel")]
struct Args {
    /// YAML pipeline config; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root holding one directory of page files per year
    #[arg(long)]
    raw_dir: Option<PathBuf>,

    /// Where the panel, findings and log are written
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Only these years (repeatable)
    #[arg(long = "year")]
    years: Vec<u16>,
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    std::panic::set_hook(Box::new(|info| {
        eprintln!("panic: {:?}", info);
    }));

    // ─── 2) configure ────────────────────────────────────────────────
    let args = Args::parse();
    let mut config = PipelineConfig::load_or_default(args.config.as_deref())?;
    if let Some(dir) = args.raw_dir {
        config.raw_dir = dir;
    }
    if let Some(dir) = args.out_dir {
        config.out_dir = dir;
    }
    if !args.years.is_empty() {
        config.years = args.years;
    }
    info!(
        raw_dir = %config.raw_dir.display(),
        out_dir = %config.out_dir.display(),
        years = config.years.len(),
        "configured"
    );

    // ─── 3) load, group, check ───────────────────────────────────────
    let outcomes = process_years(&config)?;
    let rows: usize = outcomes.iter().map(|o| o.panel.rows.len()).sum();
    let findings: usize = outcomes
        .iter()
        .map(|o| o.findings.consistency.len() + o.findings.sequence.len())
        .sum();

    // ─── 4) write outputs ────────────────────────────────────────────
    write_outputs(&outcomes, &config.out_dir, &config.all_columns())?;

    info!(years = outcomes.len(), rows, findings, "all done");
    Ok(())
}
