use tracing::{debug, warn};

use super::composite::{coerce_numeric, split_labeled, split_race_type};
use super::schema::ColumnMapping;
use crate::record::{CleanedBatch, Field, RaceRecord};
use crate::source::RawBatch;

/// Where a batch came from and which date it was resolved to.
#[derive(Debug, Clone)]
pub struct BatchTag {
    pub sequence: u64,
    pub source_file: String,
    pub date: String,
}

/// Columns a cleaned batch exposes: the mapped ones, then the derived ones
/// whose source column exists, then date and provenance.
pub fn output_columns(mapping: &ColumnMapping) -> Vec<Field> {
    let mut columns = mapping.fields.clone();
    if mapping.contains(Field::RaceName) {
        columns.extend([Field::RaceId, Field::RaceNo]);
    }
    if mapping.contains(Field::RaceType) {
        columns.push(Field::RaceDist);
    }
    if mapping.contains(Field::HorseName) {
        columns.push(Field::HorseId);
    }
    columns.extend([Field::Date, Field::SourceFile]);
    columns
}

/// Turn one schema-mapped raw batch into typed race records.
pub fn clean_batch(raw: &RawBatch, mapping: &ColumnMapping, tag: &BatchTag) -> CleanedBatch {
    let columns = output_columns(mapping);
    if raw.is_empty() {
        warn!(file = %tag.source_file, "Empty batch received");
        return CleanedBatch {
            sequence: tag.sequence,
            columns,
            records: Vec::new(),
        };
    }

    debug!(
        file = %tag.source_file,
        columns = mapping.width(),
        rows = raw.rows.len(),
        "Cleaning batch"
    );

    let records = raw
        .rows
        .iter()
        .map(|row| clean_row(row, mapping, tag))
        .collect();

    CleanedBatch {
        sequence: tag.sequence,
        columns,
        records,
    }
}

fn clean_row(row: &[String], mapping: &ColumnMapping, tag: &BatchTag) -> RaceRecord {
    let mut record = RaceRecord {
        date: tag.date.clone(),
        source_file: tag.source_file.clone(),
        ..Default::default()
    };

    for (field, cell) in mapping.fields.iter().zip(row) {
        match field {
            Field::RaceName => {
                let parsed = split_labeled(cell);
                record.race_name = cell.trim().to_string();
                record.race_no = parsed.label;
                record.race_id = parsed.id;
            }
            Field::RaceType => {
                let parsed = split_race_type(cell);
                record.race_type = Some(parsed.kind).filter(|k| !k.is_empty());
                record.race_dist = Some(parsed.distance);
            }
            Field::HorseName => {
                let parsed = split_labeled(cell);
                record.horse_name = Some(parsed.label).filter(|l| !l.is_empty());
                record.horse_id = Some(parsed.id);
            }
            Field::Going => record.going = text(cell),
            Field::JockeyName => record.jockey_name = text(cell),
            Field::TrainerName => record.trainer_name = text(cell),
            Field::Lbw => record.lbw = text(cell),
            Field::RunningPos => record.running_pos = text(cell),
            Field::FinishTime => record.finish_time = text(cell),
            Field::Plc => record.plc = coerce_numeric(cell),
            Field::HorseNo => record.horse_no = coerce_numeric(cell),
            Field::ActualWt => record.actual_wt = coerce_numeric(cell),
            Field::DeclaredWt => record.declared_wt = coerce_numeric(cell),
            Field::Draw => record.draw = coerce_numeric(cell),
            Field::PublicOdds => record.public_odds = coerce_numeric(cell),
            Field::Extra(_) => record.extras.push(text(cell)),
            // Derived and provenance columns never come from the source file.
            Field::RaceId
            | Field::RaceNo
            | Field::RaceDist
            | Field::HorseId
            | Field::Date
            | Field::SourceFile => {}
        }
    }

    record
}

fn text(cell: &str) -> Option<String> {
    let cell = cell.trim();
    if cell.is_empty() {
        None
    } else {
        Some(cell.to_string())
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::schema::map_columns;
    use crate::record::UNKNOWN;

    fn tag() -> BatchTag {
        BatchTag {
            sequence: 1,
            source_file: "races1.csv".into(),
            date: "29/12/2019".into(),
        }
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn full_row() -> Vec<String> {
        row(&[
            "RACE 1 (284)",
            "GOOD",
            "Class 4 - 1200M",
            "1",
            "7",
            "RICH AND LUCKY (C413)",
            "Z Purton",
            "F C Lor",
            "133",
            "1062",
            "3",
            "-",
            "1 1 1",
            "1:09.94",
            "4.5",
        ])
    }

    fn batch(rows: Vec<Vec<String>>) -> RawBatch {
        let width = rows.first().map(Vec::len).unwrap_or_default();
        RawBatch {
            header: Vec::new(),
            rows,
            width,
        }
    }

    #[test]
    fn full_row_is_cleaned() {
        let raw = batch(vec![full_row()]);
        let cleaned = clean_batch(&raw, &map_columns(raw.width), &tag());
        let r = &cleaned.records[0];
        assert_eq!(r.race_name, "RACE 1 (284)");
        assert_eq!(r.race_id, "284");
        assert_eq!(r.race_no, "RACE_1");
        assert_eq!(r.race_type.as_deref(), Some("CLASS_4"));
        assert_eq!(r.race_dist.as_deref(), Some("1200"));
        assert_eq!(r.horse_name.as_deref(), Some("RICH_AND_LUCKY"));
        assert_eq!(r.horse_id.as_deref(), Some("C413"));
        assert_eq!(r.plc, Some(1.0));
        assert_eq!(r.horse_no, Some(7.0));
        assert_eq!(r.actual_wt, Some(133.0));
        assert_eq!(r.declared_wt, Some(1062.0));
        assert_eq!(r.draw, Some(3.0));
        assert_eq!(r.public_odds, Some(4.5));
        assert_eq!(r.lbw.as_deref(), Some("-"));
        assert_eq!(r.running_pos.as_deref(), Some("1 1 1"));
        assert_eq!(r.finish_time.as_deref(), Some("1:09.94"));
        assert_eq!(r.jockey_name.as_deref(), Some("Z Purton"));
        assert_eq!(r.date, "29/12/2019");
        assert_eq!(r.source_file, "races1.csv");
    }

    #[test]
    fn bad_numeric_cell_does_not_touch_other_columns() {
        let mut cells = full_row();
        cells[3] = "WV".into();
        cells[8] = "".into();
        let raw = batch(vec![cells]);
        let cleaned = clean_batch(&raw, &map_columns(raw.width), &tag());
        let r = &cleaned.records[0];
        assert_eq!(r.plc, None);
        assert_eq!(r.actual_wt, None);
        assert_eq!(r.declared_wt, Some(1062.0));
        assert_eq!(r.horse_no, Some(7.0));
        assert_eq!(r.public_odds, Some(4.5));
    }

    #[test]
    fn derived_columns_follow_source_columns() {
        let mapping = map_columns(4);
        let cols: Vec<String> = output_columns(&mapping).iter().map(Field::name).collect();
        assert_eq!(
            cols,
            vec![
                "race_name", "going", "race_type", "plc", "race_id", "race_no", "race_dist",
                "date", "source_file"
            ]
        );
    }

    #[test]
    fn narrow_batch_leaves_missing_fields_absent() {
        let raw = batch(vec![row(&["RACE 2", "YIELDING", "Class 3"])]);
        let cleaned = clean_batch(&raw, &map_columns(raw.width), &tag());
        let r = &cleaned.records[0];
        assert_eq!(r.race_id, UNKNOWN);
        assert_eq!(r.race_no, "RACE_2");
        assert_eq!(r.race_dist.as_deref(), Some(UNKNOWN));
        assert_eq!(r.horse_id, None);
        assert_eq!(r.public_odds, None);
        assert!(!cleaned.columns.contains(&Field::HorseId));
    }

    #[test]
    fn extra_columns_are_kept_in_order() {
        let mut cells = full_row();
        cells.push("x0".into());
        cells.push("".into());
        cells.push("x2".into());
        let raw = batch(vec![cells]);
        let cleaned = clean_batch(&raw, &map_columns(raw.width), &tag());
        let r = &cleaned.records[0];
        assert_eq!(r.extras, vec![Some("x0".into()), None, Some("x2".into())]);
        assert!(cleaned.columns.contains(&Field::Extra(2)));
    }

    #[test]
    fn horse_without_id_defaults_to_unknown() {
        let mut cells = full_row();
        cells[5] = "GOLDEN SIXTY".into();
        let raw = batch(vec![cells]);
        let cleaned = clean_batch(&raw, &map_columns(raw.width), &tag());
        assert_eq!(cleaned.records[0].horse_id.as_deref(), Some(UNKNOWN));
        assert_eq!(cleaned.records[0].horse_name.as_deref(), Some("GOLDEN_SIXTY"));
    }

    #[test]
    fn empty_batch_short_circuits() {
        let raw = RawBatch::default();
        let cleaned = clean_batch(&raw, &map_columns(15), &tag());
        assert!(cleaned.is_empty());
        assert_eq!(cleaned.sequence, 1);
    }
}
