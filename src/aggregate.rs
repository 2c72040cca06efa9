use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::error::RunError;
use crate::record::{CleanedBatch, Field, RaceRecord};

/// Every cleaned batch flattened into one table.
#[derive(Debug, Clone)]
pub struct Combined {
    /// Union of the batch columns, in order of first appearance.
    pub columns: Vec<Field>,
    pub records: Vec<RaceRecord>,
    pub batches: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// `None` when no batch carried the column at all.
    pub total_races: Option<usize>,
    pub total_horses: Option<usize>,
    pub date_min: Option<String>,
    pub date_max: Option<String>,
    pub unique_dates: usize,
    pub total_entries: usize,
    pub batches: usize,
    pub columns: Vec<String>,
}

/// Concatenate batches in order. Fails when there is nothing to combine.
pub fn aggregate(batches: Vec<CleanedBatch>) -> Result<Combined, RunError> {
    if batches.is_empty() {
        return Err(RunError::NothingIngested);
    }

    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for batch in &batches {
        for field in &batch.columns {
            if seen.insert(*field) {
                columns.push(*field);
            }
        }
    }

    let count = batches.len();
    let records: Vec<RaceRecord> = batches.into_iter().flat_map(|b| b.records).collect();
    info!("Combined dataset created with {} total rows", records.len());

    Ok(Combined {
        columns,
        records,
        batches: count,
    })
}

impl Combined {
    pub fn has_column(&self, field: Field) -> bool {
        self.columns.contains(&field)
    }

    pub fn summary(&self) -> Summary {
        let total_races = self.has_column(Field::RaceId).then(|| {
            self.records
                .iter()
                .map(|r| r.race_id.as_str())
                .collect::<HashSet<_>>()
                .len()
        });
        let total_horses = self.has_column(Field::HorseId).then(|| {
            self.records
                .iter()
                .filter_map(|r| r.horse_id.as_deref())
                .collect::<HashSet<_>>()
                .len()
        });

        // Dates compare as strings, whatever form they were resolved in.
        let date_min = self.records.iter().map(|r| &r.date).min().cloned();
        let date_max = self.records.iter().map(|r| &r.date).max().cloned();
        let unique_dates = self
            .records
            .iter()
            .map(|r| r.date.as_str())
            .collect::<HashSet<_>>()
            .len();

        Summary {
            total_races,
            total_horses,
            date_min,
            date_max,
            unique_dates,
            total_entries: self.records.len(),
            batches: self.batches,
            columns: self.columns.iter().map(Field::name).collect(),
        }
    }

    /// Write the table as CSV with a header row. Missing values are empty cells.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.columns.iter().map(Field::name))?;
        for record in &self.records {
            wtr.write_record(
                self.columns
                    .iter()
                    .map(|field| record.cell(*field).unwrap_or_default()),
            )?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Write to `path` through a sibling temp file, so a failed write leaves
    /// no partial artifact behind.
    pub fn write_csv(&self, path: &Path) -> Result<(), RunError> {
        let tmp = temp_path(path);
        let result = fs::File::create(&tmp)
            .map_err(csv::Error::from)
            .and_then(|file| self.write_to(file))
            .and_then(|()| fs::rename(&tmp, path).map_err(csv::Error::from));

        if let Err(source) = result {
            let _ = fs::remove_file(&tmp);
            return Err(RunError::Output {
                path: path.to_path_buf(),
                source,
            });
        }
        info!("Combined dataset saved as {}", path.display());
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::CANONICAL;

    fn record(race_id: &str, horse_id: Option<&str>, date: &str, file: &str) -> RaceRecord {
        RaceRecord {
            race_name: format!("RACE 1 ({})", race_id),
            race_id: race_id.into(),
            race_no: "RACE_1".into(),
            horse_id: horse_id.map(str::to_string),
            date: date.into(),
            source_file: file.into(),
            ..Default::default()
        }
    }

    fn full_columns() -> Vec<Field> {
        let mut cols = CANONICAL.to_vec();
        cols.extend([
            Field::RaceId,
            Field::RaceNo,
            Field::RaceDist,
            Field::HorseId,
            Field::Date,
            Field::SourceFile,
        ]);
        cols
    }

    fn batch(seq: u64, columns: Vec<Field>, records: Vec<RaceRecord>) -> CleanedBatch {
        CleanedBatch {
            sequence: seq,
            columns,
            records,
        }
    }

    #[test]
    fn nothing_to_aggregate() {
        assert!(matches!(aggregate(Vec::new()), Err(RunError::NothingIngested)));
    }

    #[test]
    fn union_keeps_first_appearance_order_and_rows() {
        let narrow = vec![
            Field::RaceName,
            Field::Going,
            Field::RaceId,
            Field::RaceNo,
            Field::Date,
            Field::SourceFile,
        ];
        let mut wide = full_columns();
        wide.insert(15, Field::Extra(0));

        let combined = aggregate(vec![
            batch(1, narrow, vec![record("284", None, "29/12/2019", "races1.csv")]),
            batch(
                2,
                wide,
                vec![
                    record("285", Some("C413"), "28/12/2019", "races2.csv"),
                    record("285", Some("A123"), "28/12/2019", "races2.csv"),
                ],
            ),
        ])
        .unwrap();

        assert_eq!(combined.records.len(), 3);
        assert_eq!(combined.records[0].source_file, "races1.csv");
        assert_eq!(&combined.columns[..2], &[Field::RaceName, Field::Going]);
        assert_eq!(combined.columns[2], Field::RaceId);
        assert!(combined.has_column(Field::Extra(0)));
        assert!(combined.has_column(Field::PublicOdds));
        assert_eq!(combined.columns.len(), 22);
    }

    #[test]
    fn summary_counts() {
        let combined = aggregate(vec![batch(
            1,
            full_columns(),
            vec![
                record("284", Some("C413"), "29/12/2019", "races1.csv"),
                record("284", Some("A123"), "29/12/2019", "races1.csv"),
                record("285", Some("C413"), "Unknown_2", "races2.csv"),
            ],
        )])
        .unwrap();

        let s = combined.summary();
        assert_eq!(s.total_races, Some(2));
        assert_eq!(s.total_horses, Some(2));
        assert_eq!(s.date_min.as_deref(), Some("29/12/2019"));
        assert_eq!(s.date_max.as_deref(), Some("Unknown_2"));
        assert_eq!(s.unique_dates, 2);
        assert_eq!(s.total_entries, 3);
        assert_eq!(s.batches, 1);
    }

    #[test]
    fn horses_unknown_without_horse_column() {
        let combined = aggregate(vec![batch(
            1,
            vec![Field::RaceName, Field::RaceId, Field::RaceNo, Field::Date, Field::SourceFile],
            vec![record("284", None, "29/12/2019", "races1.csv")],
        )])
        .unwrap();
        assert_eq!(combined.summary().total_horses, None);
        assert_eq!(combined.summary().total_races, Some(1));
    }

    #[test]
    fn written_table_reads_back() {
        let combined = aggregate(vec![
            batch(
                1,
                vec![Field::RaceName, Field::RaceId, Field::RaceNo, Field::Date, Field::SourceFile],
                vec![record("284", None, "29/12/2019", "races1.csv")],
            ),
            batch(
                2,
                full_columns(),
                vec![RaceRecord {
                    plc: Some(1.0),
                    public_odds: Some(4.5),
                    ..record("285", Some("C413"), "28/12/2019", "races2.csv")
                }],
            ),
        ])
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("combined_race_data.csv");
        combined.write_csv(&path).unwrap();
        assert!(!temp_path(&path).exists());

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = rdr.headers().unwrap().iter().map(str::to_string).collect();
        let expected: Vec<String> = combined.columns.iter().map(Field::name).collect();
        assert_eq!(headers, expected);

        let rows: Vec<csv::StringRecord> = rdr.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), combined.records.len());

        let plc = headers.iter().position(|h| h == "plc").unwrap();
        assert_eq!(&rows[0][plc], "");
        assert_eq!(&rows[1][plc], "1");
        let odds = headers.iter().position(|h| h == "public_odds").unwrap();
        assert_eq!(&rows[1][odds], "4.5");
    }

    #[test]
    fn failed_write_leaves_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing_dir").join("out.csv");
        let combined = aggregate(vec![batch(
            1,
            full_columns(),
            vec![record("284", None, "29/12/2019", "races1.csv")],
        )])
        .unwrap();
        assert!(matches!(combined.write_csv(&path), Err(RunError::Output { .. })));
        assert!(!path.exists());
    }
}
