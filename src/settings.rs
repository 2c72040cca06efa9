use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ingest::Naming;
use crate::parser::schema::SchemaPolicy;

const DEFAULT_FILE: &str = "dataprep";
const ENV_PREFIX: &str = "DATAPREP";

/// Run settings: defaults, then `dataprep.toml`, then `DATAPREP_*` variables.
/// Command-line flags are applied on top by the caller.
///
/// Relative `checkpoint` and `output` paths live in `input_dir`, next to the
/// extracts; absolute paths are used as given. `ledger` is taken as given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub input_dir: PathBuf,
    pub prefix: String,
    pub extension: String,
    pub checkpoint: PathBuf,
    pub output: PathBuf,
    /// The scraper writes a positional header line ("0,1,2,…") above the rows.
    pub has_header_row: bool,
    pub strict_schema: bool,
    #[serde(default)]
    pub ledger: Option<PathBuf>,
}

impl Settings {
    pub fn naming(&self) -> Naming {
        Naming::new(&self.prefix, &self.extension)
    }

    pub fn schema_policy(&self) -> SchemaPolicy {
        if self.strict_schema {
            SchemaPolicy::Strict
        } else {
            SchemaPolicy::Lenient
        }
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.input_dir.join(&self.checkpoint)
    }

    pub fn output_path(&self) -> PathBuf {
        self.input_dir.join(&self.output)
    }
}

/// Load settings. An explicit file must exist; the default one is optional.
pub fn load(file: Option<&Path>) -> Result<Settings> {
    let source = match file {
        Some(path) => File::from(path).required(true),
        None => File::with_name(DEFAULT_FILE).required(false),
    };

    let settings = Config::builder()
        .set_default("input_dir", ".")?
        .set_default("prefix", "races")?
        .set_default("extension", "csv")?
        .set_default("checkpoint", "progress.txt")?
        .set_default("output", "combined_race_data.csv")?
        .set_default("has_header_row", true)?
        .set_default("strict_schema", false)?
        .add_source(source)
        .add_source(Environment::with_prefix(ENV_PREFIX))
        .build()
        .context("Failed to load settings")?;

    settings
        .try_deserialize()
        .context("Invalid settings")
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "input_dir = \"scraped\"\nstrict_schema = true\nledger = \"runs.sqlite\"\n",
        )
        .unwrap();

        let s = load(Some(&path)).unwrap();
        assert_eq!(s.input_dir, PathBuf::from("scraped"));
        assert_eq!(s.prefix, "races");
        assert_eq!(s.extension, "csv");
        assert!(s.has_header_row);
        assert_eq!(s.schema_policy(), SchemaPolicy::Strict);
        assert_eq!(s.ledger, Some(PathBuf::from("runs.sqlite")));
        assert_eq!(s.checkpoint_path(), PathBuf::from("scraped/progress.txt"));
        assert_eq!(s.output_path(), PathBuf::from("scraped/combined_race_data.csv"));
    }

    #[test]
    fn absolute_paths_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "input_dir = \"scraped\"\n").unwrap();
        let mut s = load(Some(&path)).unwrap();
        s.output = dir.path().join("out.csv");
        s.checkpoint = dir.path().join("dates.txt");
        assert_eq!(s.output_path(), dir.path().join("out.csv"));
        assert_eq!(s.checkpoint_path(), dir.path().join("dates.txt"));
    }

    #[test]
    fn explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
