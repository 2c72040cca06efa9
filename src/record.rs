use std::fmt;

/// Sentinel for ids and distances that the source field did not carry.
pub const UNKNOWN: &str = "Unknown";

/// Columns the scraper emits for every race entry, in positional order.
pub const CANONICAL: [Field; 15] = [
    Field::RaceName,
    Field::Going,
    Field::RaceType,
    Field::Plc,
    Field::HorseNo,
    Field::HorseName,
    Field::JockeyName,
    Field::TrainerName,
    Field::ActualWt,
    Field::DeclaredWt,
    Field::Draw,
    Field::Lbw,
    Field::RunningPos,
    Field::FinishTime,
    Field::PublicOdds,
];

/// Every column that can appear in a cleaned batch or the combined table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    RaceName,
    Going,
    RaceType,
    Plc,
    HorseNo,
    HorseName,
    JockeyName,
    TrainerName,
    ActualWt,
    DeclaredWt,
    Draw,
    Lbw,
    RunningPos,
    FinishTime,
    PublicOdds,
    RaceId,
    RaceNo,
    RaceDist,
    HorseId,
    Date,
    SourceFile,
    Extra(usize),
}

impl Field {
    pub fn name(&self) -> String {
        let name = match self {
            Field::RaceName => "race_name",
            Field::Going => "going",
            Field::RaceType => "race_type",
            Field::Plc => "plc",
            Field::HorseNo => "horse_no",
            Field::HorseName => "horse_name",
            Field::JockeyName => "jockey_name",
            Field::TrainerName => "trainer_name",
            Field::ActualWt => "actual_wt",
            Field::DeclaredWt => "declared_wt",
            Field::Draw => "draw",
            Field::Lbw => "lbw",
            Field::RunningPos => "running_pos",
            Field::FinishTime => "finish_time",
            Field::PublicOdds => "public_odds",
            Field::RaceId => "race_id",
            Field::RaceNo => "race_no",
            Field::RaceDist => "race_dist",
            Field::HorseId => "horse_id",
            Field::Date => "date",
            Field::SourceFile => "source_file",
            Field::Extra(i) => return format!("extra_col_{}", i),
        };
        name.to_string()
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// One participant in one race, after cleaning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RaceRecord {
    pub race_name: String,
    pub race_id: String,
    pub race_no: String,
    pub going: Option<String>,
    pub race_type: Option<String>,
    pub race_dist: Option<String>,
    pub plc: Option<f64>,
    pub horse_no: Option<f64>,
    pub horse_name: Option<String>,
    pub horse_id: Option<String>,
    pub jockey_name: Option<String>,
    pub trainer_name: Option<String>,
    pub actual_wt: Option<f64>,
    pub declared_wt: Option<f64>,
    pub draw: Option<f64>,
    pub lbw: Option<String>,
    pub running_pos: Option<String>,
    pub finish_time: Option<String>,
    pub public_odds: Option<f64>,
    pub extras: Vec<Option<String>>,
    pub date: String,
    pub source_file: String,
}

impl RaceRecord {
    /// Render one column as an output cell; `None` means the value is missing.
    pub fn cell(&self, field: Field) -> Option<String> {
        match field {
            Field::RaceName => Some(self.race_name.clone()),
            Field::RaceId => Some(self.race_id.clone()),
            Field::RaceNo => Some(self.race_no.clone()),
            Field::Going => self.going.clone(),
            Field::RaceType => self.race_type.clone(),
            Field::RaceDist => self.race_dist.clone(),
            Field::Plc => self.plc.map(format_number),
            Field::HorseNo => self.horse_no.map(format_number),
            Field::HorseName => self.horse_name.clone(),
            Field::HorseId => self.horse_id.clone(),
            Field::JockeyName => self.jockey_name.clone(),
            Field::TrainerName => self.trainer_name.clone(),
            Field::ActualWt => self.actual_wt.map(format_number),
            Field::DeclaredWt => self.declared_wt.map(format_number),
            Field::Draw => self.draw.map(format_number),
            Field::Lbw => self.lbw.clone(),
            Field::RunningPos => self.running_pos.clone(),
            Field::FinishTime => self.finish_time.clone(),
            Field::PublicOdds => self.public_odds.map(format_number),
            Field::Extra(i) => self.extras.get(i).cloned().flatten(),
            Field::Date => Some(self.date.clone()),
            Field::SourceFile => Some(self.source_file.clone()),
        }
    }
}

/// The cleaned records of one source file, with the columns that file produced.
#[derive(Debug, Clone, Default)]
pub struct CleanedBatch {
    pub sequence: u64,
    pub columns: Vec<Field>,
    pub records: Vec<RaceRecord>,
}

impl CleanedBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Integral values print without a fractional part ("3" rather than "3.0").
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_in_scraper_order() {
        let names: Vec<String> = CANONICAL.iter().map(Field::name).collect();
        assert_eq!(names[0], "race_name");
        assert_eq!(names[3], "plc");
        assert_eq!(names[14], "public_odds");
        assert_eq!(Field::Extra(2).to_string(), "extra_col_2");
    }

    #[test]
    fn numbers_format_like_a_table_export() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-2.0), "-2");
        assert_eq!(format_number(4.5), "4.5");
        assert_eq!(format_number(0.25), "0.25");
    }

    #[test]
    fn missing_values_render_as_none() {
        let record = RaceRecord {
            race_name: "RACE 1 (284)".into(),
            date: "29/12/2019".into(),
            extras: vec![Some("x".into()), None],
            ..Default::default()
        };
        assert_eq!(record.cell(Field::Plc), None);
        assert_eq!(record.cell(Field::Extra(0)).as_deref(), Some("x"));
        assert_eq!(record.cell(Field::Extra(1)), None);
        assert_eq!(record.cell(Field::Extra(7)), None);
        assert_eq!(record.cell(Field::Date).as_deref(), Some("29/12/2019"));
    }
}
