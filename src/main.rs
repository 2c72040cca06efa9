mod aggregate;
mod dates;
mod error;
mod ingest;
mod ledger;
mod parser;
mod record;
mod settings;
mod source;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info, warn};

use aggregate::Summary;
use dates::DateMapping;
use error::RunError;
use ingest::{Diagnostic, RunContext, RunReport};
use settings::Settings;

#[derive(Parser)]
#[command(
    name = "race_dataprep",
    about = "Normalize scraped race-result extracts into one dataset"
)]
struct Cli {
    /// Settings file (default: ./dataprep.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding the raw extracts and the checkpoint file
    #[arg(long, global = true)]
    input_dir: Option<PathBuf>,
    /// Combined CSV to write
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
    /// Checkpoint file, one DD/MM/YYYY per line
    #[arg(long, global = true)]
    checkpoint: Option<PathBuf>,
    /// File name prefix of the extracts
    #[arg(long, global = true)]
    prefix: Option<String>,
    /// Reject extracts with fewer columns than expected
    #[arg(long, global = true)]
    strict_schema: bool,
    /// Record runs in this SQLite ledger
    #[arg(long, global = true)]
    ledger: Option<PathBuf>,
    /// Print the run summary as JSON
    #[arg(long, global = true)]
    json: bool,
    #[arg(long, global = true)]
    no_progress: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Date each extract from the scraper's checkpoint file
    Run,
    /// Date extracts 1..N from consecutive days of an explicit range
    Range {
        /// First day, DD/MM/YYYY
        #[arg(long)]
        start: String,
        /// Last day (inclusive), DD/MM/YYYY
        #[arg(long)]
        end: String,
    },
    /// Show recent runs from the ledger
    Runs {
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },
}

enum Mode {
    Checkpoint,
    Range { start: String, end: String },
}

impl Mode {
    fn as_str(&self) -> &'static str {
        match self {
            Mode::Checkpoint => "checkpoint",
            Mode::Range { .. } => "range",
        }
    }
}

struct RunOptions {
    show_progress: bool,
    json: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = settings::load(cli.config.as_deref())?;
    apply_overrides(&cli, &mut settings);

    let opts = RunOptions {
        show_progress: !cli.no_progress && !cli.json,
        json: cli.json,
    };

    let result = match cli.command {
        Commands::Run => run_pipeline(&settings, &Mode::Checkpoint, &opts).map(|_| ()),
        Commands::Range { start, end } => {
            run_pipeline(&settings, &Mode::Range { start, end }, &opts).map(|_| ())
        }
        Commands::Runs { limit } => show_runs(&settings, limit),
    };

    if !cli.json {
        println!("\nDone in {}", elapsed_label(t0.elapsed()));
    }

    result
}

fn apply_overrides(cli: &Cli, settings: &mut Settings) {
    if let Some(dir) = &cli.input_dir {
        settings.input_dir = dir.clone();
    }
    if let Some(output) = &cli.output {
        settings.output = output.clone();
    }
    if let Some(checkpoint) = &cli.checkpoint {
        settings.checkpoint = checkpoint.clone();
    }
    if let Some(prefix) = &cli.prefix {
        settings.prefix = prefix.clone();
    }
    if cli.strict_schema {
        settings.strict_schema = true;
    }
    if let Some(ledger) = &cli.ledger {
        settings.ledger = Some(ledger.clone());
    }
}

/// Discover → date → ingest → aggregate → write. Any error return means no
/// output was written.
fn run_pipeline(settings: &Settings, mode: &Mode, opts: &RunOptions) -> Result<Summary> {
    info!("Starting data preparation ({} mode)", mode.as_str());
    let run_id = ledger::new_run_id();
    let started_at = Utc::now().to_rfc3339();

    let naming = settings.naming();
    let files = ingest::discover(&settings.input_dir, &naming)?;
    if files.is_empty() {
        error!("No source files found. Has the scraper produced {}?", naming.pattern());
        return Err(RunError::NoSourceFiles {
            dir: settings.input_dir.clone(),
            pattern: naming.pattern(),
        }
        .into());
    }

    let exists = |seq: u64| ingest::source_exists(&settings.input_dir, &naming, seq);
    let dates = match mode {
        Mode::Checkpoint => DateMapping::from_checkpoint(&settings.checkpoint_path(), exists),
        Mode::Range { start, end } => DateMapping::from_range(start, end, exists)?,
    };
    if dates.is_empty() {
        info!("No date mappings; dates come from the data or placeholders");
    }

    let mut ctx = RunContext::new(settings, dates);
    ctx.show_progress = opts.show_progress;
    let ingested = ingest::ingest(&mut ctx, &files);
    let report = ingested.report;

    let output = settings.output_path();
    let written = aggregate::aggregate(ingested.batches).and_then(|combined| {
        combined.write_csv(&output)?;
        Ok(combined.summary())
    });

    // Ledger errors are logged only; the run result stands.
    if let Some(path) = &settings.ledger {
        let entry = ledger::RunEntry {
            run_id: &run_id,
            mode: mode.as_str(),
            started_at,
            output: written.as_ref().ok().map(|_| output.as_path()),
            total_entries: written.as_ref().ok().map(|s| s.total_entries),
            ok: written.is_ok(),
        };
        if let Err(e) = record_in_ledger(path, &entry, &report) {
            warn!("Run {} not recorded in ledger {}: {:#}", run_id, path.display(), e);
        }
    }

    let summary = match written {
        Ok(summary) => summary,
        Err(e) => {
            error!("{}", e);
            print_skipped(&report);
            return Err(e.into());
        }
    };

    if opts.json {
        print_json(&run_id, &summary, &report)?;
    } else {
        print_summary(&summary, &output);
        print_skipped(&report);
    }
    Ok(summary)
}

fn record_in_ledger(path: &Path, entry: &ledger::RunEntry, report: &RunReport) -> Result<()> {
    let conn = ledger::connect(path)?;
    ledger::init_schema(&conn)?;
    ledger::record_run(&conn, entry, report)
}

fn print_summary(summary: &Summary, output: &Path) {
    let count = |n: Option<usize>| n.map(|n| n.to_string()).unwrap_or_else(|| "Unknown".into());
    println!("{}", "=".repeat(50));
    println!("DATASET SUMMARY:");
    println!("Total races:   {}", count(summary.total_races));
    println!("Total horses:  {}", count(summary.total_horses));
    println!(
        "Date range:    {} to {}",
        summary.date_min.as_deref().unwrap_or("-"),
        summary.date_max.as_deref().unwrap_or("-")
    );
    println!("Unique dates:  {}", summary.unique_dates);
    println!("Total entries: {}", summary.total_entries);
    println!("Batches:       {}", summary.batches);
    println!("{}", "=".repeat(50));

    println!("\nColumns in {}:", output.display());
    for (i, col) in summary.columns.iter().enumerate() {
        println!("{:2}. {}", i + 1, col);
    }
}

fn print_skipped(report: &RunReport) {
    let skipped: Vec<_> = report.skipped().collect();
    if skipped.is_empty() {
        return;
    }
    println!("\n--- Skipped files ({}) ---", skipped.len());
    for (file, reason) in skipped {
        println!("  {}: {}", file, reason);
    }
}

#[derive(Serialize)]
struct SkippedFile<'a> {
    file: &'a str,
    reason: &'static str,
    detail: String,
}

#[derive(Serialize)]
struct RunOutput<'a> {
    run_id: &'a str,
    summary: &'a Summary,
    skipped: Vec<SkippedFile<'a>>,
    diagnostics: &'a [Diagnostic],
}

fn print_json(run_id: &str, summary: &Summary, report: &RunReport) -> Result<()> {
    let out = RunOutput {
        run_id,
        summary,
        skipped: report
            .skipped()
            .map(|(file, reason)| SkippedFile {
                file,
                reason: reason.kind(),
                detail: reason.to_string(),
            })
            .collect(),
        diagnostics: &report.diagnostics,
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn show_runs(settings: &Settings, limit: usize) -> Result<()> {
    let path = settings
        .ledger
        .as_ref()
        .ok_or_else(|| anyhow!("No ledger configured. Pass --ledger or set DATAPREP_LEDGER."))?;
    let conn = ledger::connect(path)?;
    ledger::init_schema(&conn)?;
    let runs = ledger::fetch_recent(&conn, limit)?;
    if runs.is_empty() {
        println!("No runs recorded.");
        return Ok(());
    }

    println!(
        "{:<23} | {:<10} | {:<19} | {:>5} | {:>5} | {:>5} | {:>7} | {:<6}",
        "Run", "Mode", "Started (UTC)", "Found", "Ok", "Skip", "Entries", "Status"
    );
    println!("{}", "-".repeat(101));
    for r in &runs {
        let entries = r
            .total_entries
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<23} | {:<10} | {:<19} | {:>5} | {:>5} | {:>5} | {:>7} | {:<6}",
            r.run_id,
            r.mode,
            started_label(&r.started_at),
            r.discovered,
            r.ingested,
            r.skipped,
            entries,
            r.status
        );
    }

    let latest = &runs[0];
    let skipped = ledger::fetch_skipped(&conn, &latest.run_id)?;
    if !skipped.is_empty() {
        println!("\n--- Skipped in {} ---", latest.run_id);
        for (file, outcome, detail) in &skipped {
            println!("  {} [{}]: {}", file, outcome, detail);
        }
    }
    Ok(())
}

/// Ledger timestamps are RFC 3339; the table shows them to the second in UTC.
fn started_label(started_at: &str) -> String {
    DateTime::parse_from_rfc3339(started_at)
        .map(|t| t.with_timezone(&Utc).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| started_at.to_string())
}

fn elapsed_label(d: Duration) -> String {
    match d.as_millis() {
        ms if ms < 1000 => format!("{}ms", ms),
        _ => format!("{:.2}s", d.as_secs_f64()),
    }
}

// ── Tests ──
