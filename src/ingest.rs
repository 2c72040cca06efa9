use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::dates::{DateMapping, DateOrigin, ResolvedDate};
use crate::error::SkipReason;
use crate::parser::{self, clean::BatchTag, schema::SchemaPolicy};
use crate::record::CleanedBatch;
use crate::settings::Settings;
use crate::source;

static NON_DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\D").unwrap());

/// File naming convention of the scraper: `<prefix><N>.<extension>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Naming {
    prefix: String,
    extension: String,
}

impl Naming {
    pub fn new(prefix: &str, extension: &str) -> Self {
        Naming {
            prefix: prefix.to_string(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    fn suffix(&self) -> String {
        format!(".{}", self.extension)
    }

    /// Glob-style match: `<prefix>*.<extension>`.
    pub fn matches(&self, file_name: &str) -> bool {
        file_name.starts_with(&self.prefix) && file_name.ends_with(&self.suffix())
    }

    /// The sequence number of a well-formed name, `races12.csv` → 12.
    pub fn sequence(&self, file_name: &str) -> Option<u64> {
        let digits = file_name
            .strip_prefix(&self.prefix)?
            .strip_suffix(&self.suffix())?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    pub fn file_name(&self, sequence: u64) -> String {
        format!("{}{}{}", self.prefix, sequence, self.suffix())
    }

    pub fn pattern(&self) -> String {
        format!("{}*{}", self.prefix, self.suffix())
    }
}

/// Ordering key: every digit in the file name, read as one number.
pub fn order_key(file_name: &str) -> Option<u64> {
    NON_DIGIT.replace_all(file_name, "").parse().ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub name: String,
    pub order_key: Option<u64>,
}

/// List the extract files in `dir`, numerically ordered. Names without
/// digits go last, alphabetically.
pub fn discover(dir: &Path, naming: &Naming) -> Result<Vec<SourceFile>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to list input directory {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !naming.matches(&name) || !entry.path().is_file() {
            continue;
        }
        files.push(SourceFile {
            path: entry.path(),
            order_key: order_key(&name),
            name,
        });
    }

    files.sort_by_key(|f| (f.order_key.is_none(), f.order_key, f.name.clone()));
    info!("Found {} source files matching {}", files.len(), naming.pattern());
    Ok(files)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub file: String,
    pub level: Level,
    pub message: String,
}

/// Per-run diagnostics sink. Every entry is also emitted as a tracing event.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn info(&mut self, file: &str, message: impl Into<String>) {
        let message = message.into();
        info!(file = %file, "{}", message);
        self.push(file, Level::Info, message);
    }

    pub fn warn(&mut self, file: &str, message: impl Into<String>) {
        let message = message.into();
        warn!(file = %file, "{}", message);
        self.push(file, Level::Warn, message);
    }

    pub fn error(&mut self, file: &str, message: impl Into<String>) {
        let message = message.into();
        error!(file = %file, "{}", message);
        self.push(file, Level::Error, message);
    }

    fn push(&mut self, file: &str, level: Level, message: String) {
        self.entries.push(Diagnostic {
            file: file.to_string(),
            level,
            message,
        });
    }

    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.entries)
    }
}

/// What happened to one source file.
#[derive(Debug)]
pub enum FileOutcome {
    Ingested {
        file: String,
        sequence: u64,
        rows: usize,
        date: String,
        date_origin: DateOrigin,
    },
    Skipped {
        file: String,
        reason: SkipReason,
    },
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub discovered: usize,
    pub outcomes: Vec<FileOutcome>,
    pub diagnostics: Vec<Diagnostic>,
}

impl RunReport {
    pub fn ingested(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, FileOutcome::Ingested { .. }))
            .count()
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&str, &SkipReason)> {
        self.outcomes.iter().filter_map(|o| match o {
            FileOutcome::Skipped { file, reason } => Some((file.as_str(), reason)),
            FileOutcome::Ingested { .. } => None,
        })
    }
}

/// State threaded through one ingestion run.
#[derive(Debug)]
pub struct RunContext {
    pub naming: Naming,
    pub has_header_row: bool,
    pub policy: SchemaPolicy,
    pub dates: DateMapping,
    pub diagnostics: Diagnostics,
    pub show_progress: bool,
}

impl RunContext {
    pub fn new(settings: &Settings, dates: DateMapping) -> Self {
        RunContext {
            naming: settings.naming(),
            has_header_row: settings.has_header_row,
            policy: settings.schema_policy(),
            dates,
            diagnostics: Diagnostics::default(),
            show_progress: false,
        }
    }
}

/// Whether the extract for `sequence` is on disk.
pub fn source_exists(dir: &Path, naming: &Naming, sequence: u64) -> bool {
    dir.join(naming.file_name(sequence)).is_file()
}

/// Cleaned batches in file order plus the per-file report.
#[derive(Debug, Default)]
pub struct Ingested {
    pub batches: Vec<CleanedBatch>,
    pub report: RunReport,
}

/// Load, date and clean every file in order. A failing file is logged,
/// recorded as skipped, and never stops the loop.
pub fn ingest(ctx: &mut RunContext, files: &[SourceFile]) -> Ingested {
    let pb = if ctx.show_progress {
        ProgressBar::new(files.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    let mut batches = Vec::new();
    let mut outcomes = Vec::with_capacity(files.len());

    for file in files {
        pb.set_message(file.name.clone());
        match ingest_one(ctx, file) {
            Ok(batch) => {
                let outcome = FileOutcome::Ingested {
                    file: file.name.clone(),
                    sequence: batch.sequence,
                    rows: batch.cleaned.len(),
                    date: batch.date.value.clone(),
                    date_origin: batch.date.origin,
                };
                ctx.diagnostics.info(
                    &file.name,
                    format!("Processed with {} rows", batch.cleaned.len()),
                );
                batches.push(batch.cleaned);
                outcomes.push(outcome);
            }
            Err(reason) => {
                match &reason {
                    SkipReason::Empty => ctx.diagnostics.warn(&file.name, "Empty, skipping"),
                    _ => ctx
                        .diagnostics
                        .error(&file.name, format!("Error processing file: {}", reason)),
                }
                outcomes.push(FileOutcome::Skipped {
                    file: file.name.clone(),
                    reason,
                });
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ingested {
        batches,
        report: RunReport {
            discovered: files.len(),
            outcomes,
            diagnostics: ctx.diagnostics.take(),
        },
    }
}

struct DatedBatch {
    sequence: u64,
    date: ResolvedDate,
    cleaned: CleanedBatch,
}

fn ingest_one(ctx: &mut RunContext, file: &SourceFile) -> Result<DatedBatch, SkipReason> {
    let sequence = ctx
        .naming
        .sequence(&file.name)
        .ok_or_else(|| SkipReason::BadSequence(file.name.clone()))?;

    let raw = source::load(&file.path, ctx.has_header_row)?;

    let date = ctx.dates.resolve(sequence, &raw);
    match date.origin {
        DateOrigin::Mapped | DateOrigin::InData => ctx
            .diagnostics
            .info(&file.name, format!("Added date {}", date.value)),
        DateOrigin::Placeholder => ctx.diagnostics.warn(
            &file.name,
            format!("Could not determine date, using {}", date.value),
        ),
    }

    let tag = BatchTag {
        sequence,
        source_file: file.name.clone(),
        date: date.value.clone(),
    };
    let cleaned = parser::process_batch(&raw, &tag, ctx.policy)?;
    if cleaned.is_empty() {
        return Err(SkipReason::Empty);
    }

    Ok(DatedBatch {
        sequence,
        date,
        cleaned,
    })
}

// ── Tests ──
