use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};

use crate::error::SkipReason;

/// One raw extract file: the optional positional header and its rows.
///
/// Rows shorter than the batch width are padded with empty cells.
#[derive(Debug, Clone, Default)]
pub struct RawBatch {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub width: usize,
}

impl RawBatch {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First non-empty value under a header column whose name mentions a date.
    pub fn date_in_data(&self) -> Option<&str> {
        let col = self
            .header
            .iter()
            .position(|name| name.to_lowercase().contains("date"))?;
        self.rows
            .first()
            .and_then(|row| row.get(col))
            .map(|cell| cell.trim())
            .filter(|cell| !cell.is_empty())
    }
}

/// Load a raw extract from disk.
pub fn load(path: &Path, has_header: bool) -> Result<RawBatch, SkipReason> {
    let file = File::open(path)?;
    read(file, has_header)
}

/// Parse a raw extract. The batch width is the header width when there is
/// one, otherwise the width of the first row; a longer row fails the file.
pub fn read<R: Read>(reader: R, has_header: bool) -> Result<RawBatch, SkipReason> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(has_header)
        .flexible(true)
        .from_reader(reader);

    let header: Vec<String> = if has_header {
        rdr.headers()?.iter().map(|h| h.trim().to_string()).collect()
    } else {
        Vec::new()
    };
    let mut width = header.len();

    let mut rows = Vec::new();
    let mut record = StringRecord::new();
    while rdr.read_record(&mut record)? {
        if width == 0 {
            width = record.len();
        }
        if record.len() > width {
            return Err(SkipReason::RaggedRow {
                line: record.position().map(|p| p.line()).unwrap_or_default(),
                expected: width,
                found: record.len(),
            });
        }
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(width, String::new());
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(SkipReason::Empty);
    }

    Ok(RawBatch {
        header,
        rows,
        width,
    })
}

// ── Tests ──
