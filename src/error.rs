use std::path::PathBuf;

use thiserror::Error;

/// Why a single source file was left out of the run.
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("cannot read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("file has no data rows")]
    Empty,
    #[error("line {line}: expected at most {expected} fields, found {found}")]
    RaggedRow {
        line: u64,
        expected: usize,
        found: usize,
    },
    #[error("file name carries no sequence number: {0}")]
    BadSequence(String),
    #[error("only {found} of {expected} columns present (strict schema)")]
    NarrowSchema { found: usize, expected: usize },
}

impl SkipReason {
    /// Short stable label, used as the ledger's outcome column.
    pub fn kind(&self) -> &'static str {
        match self {
            SkipReason::Io(_) => "io",
            SkipReason::Csv(_) => "csv",
            SkipReason::Empty => "empty",
            SkipReason::RaggedRow { .. } => "ragged_row",
            SkipReason::BadSequence(_) => "bad_sequence",
            SkipReason::NarrowSchema { .. } => "narrow_schema",
        }
    }
}

/// Conditions that end a run without an output artifact.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("no source files matching {pattern} in {}", dir.display())]
    NoSourceFiles { dir: PathBuf, pattern: String },
    #[error("no source file could be ingested")]
    NothingIngested,
    #[error("failed to write {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("invalid date {0:?}, expected DD/MM/YYYY")]
    BadDate(String),
}
