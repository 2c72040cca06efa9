use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{Duration, NaiveDate};
use tracing::{info, warn};

use crate::error::RunError;
use crate::source::RawBatch;

/// Checkpoint and range dates are written day-first.
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Source-file sequence number → race-day date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateMapping(BTreeMap<u64, String>);

/// Which strategy produced a batch's date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOrigin {
    Mapped,
    InData,
    Placeholder,
}

impl DateOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateOrigin::Mapped => "mapped",
            DateOrigin::InData => "in_data",
            DateOrigin::Placeholder => "placeholder",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDate {
    pub value: String,
    pub origin: DateOrigin,
}

impl DateMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sequence: u64, date: impl Into<String>) {
        self.0.insert(sequence, date.into());
    }

    pub fn get(&self, sequence: u64) -> Option<&str> {
        self.0.get(&sequence).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Build the mapping from checkpoint lines: line N dates sequence N, but
    /// only when `exists(N)` says that source file is on disk.
    pub fn from_lines<'a>(
        lines: impl IntoIterator<Item = &'a str>,
        exists: impl Fn(u64) -> bool,
    ) -> Self {
        let mut mapping = Self::new();
        for (seq, line) in (1u64..).zip(lines) {
            let date = line.trim();
            if !date.is_empty() && exists(seq) {
                mapping.insert(seq, date);
            }
        }
        mapping
    }

    /// Read the checkpoint file. A file that is missing or unreadable only
    /// costs the mapping; the run falls back to in-data dates and placeholders.
    pub fn from_checkpoint(path: &Path, exists: impl Fn(u64) -> bool) -> Self {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(
                    "No checkpoint file at {}. Will try to extract dates from data.",
                    path.display()
                );
                return Self::new();
            }
            Err(e) => {
                warn!(
                    "Cannot read checkpoint {}: {}. Will try to extract dates from data.",
                    path.display(),
                    e
                );
                return Self::new();
            }
        };

        let mapping = Self::from_lines(text.lines(), exists);
        info!("Found {} date mappings from checkpoint file", mapping.len());
        mapping
    }

    /// Map sequences 1, 2, … onto consecutive days of `[start, end]`, stopping
    /// at the first sequence with no source file.
    pub fn from_range(
        start: &str,
        end: &str,
        exists: impl Fn(u64) -> bool,
    ) -> Result<Self, RunError> {
        let start = parse_date(start)?;
        let end = parse_date(end)?;

        let mut mapping = Self::new();
        let mut seq = 1u64;
        let mut day = start;
        while day <= end {
            if exists(seq) {
                mapping.insert(seq, day.format(DATE_FORMAT).to_string());
                seq += 1;
            }
            day += Duration::days(1);
        }

        info!("Created date mapping for {} files", mapping.len());
        Ok(mapping)
    }

    /// Pick a batch's date: mapping, then a date column in the data, then a
    /// `Unknown_<seq>` placeholder.
    pub fn resolve(&self, sequence: u64, raw: &RawBatch) -> ResolvedDate {
        if let Some(date) = self.get(sequence) {
            return ResolvedDate {
                value: date.to_string(),
                origin: DateOrigin::Mapped,
            };
        }
        if let Some(date) = raw.date_in_data() {
            return ResolvedDate {
                value: date.to_string(),
                origin: DateOrigin::InData,
            };
        }
        ResolvedDate {
            value: format!("Unknown_{}", sequence),
            origin: DateOrigin::Placeholder,
        }
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate, RunError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|_| RunError::BadDate(s.to_string()))
}

// ── Tests ──
