use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::Connection;

use crate::ingest::{FileOutcome, RunReport};

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create ledger directory {}", parent.display()))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open ledger {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS runs (
            id            INTEGER PRIMARY KEY,
            run_id        TEXT UNIQUE NOT NULL,
            mode          TEXT NOT NULL,
            started_at    TEXT NOT NULL,
            discovered    INTEGER NOT NULL,
            ingested      INTEGER NOT NULL,
            skipped       INTEGER NOT NULL,
            total_entries INTEGER,
            output        TEXT,
            status        TEXT NOT NULL CHECK(status IN ('ok','failed')),
            created_at    TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS run_files (
            id          INTEGER PRIMARY KEY,
            run_id      TEXT NOT NULL REFERENCES runs(run_id),
            file        TEXT NOT NULL,
            outcome     TEXT NOT NULL,
            sequence    INTEGER,
            rows        INTEGER,
            date        TEXT,
            date_origin TEXT,
            detail      TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_run_files_run ON run_files(run_id);
        ",
    )?;
    Ok(())
}

pub fn new_run_id() -> String {
    Utc::now().format("run-%Y%m%d-%H%M%S%.3f").to_string()
}

/// Header of one ledger entry; the per-file rows come from the report.
pub struct RunEntry<'a> {
    pub run_id: &'a str,
    pub mode: &'a str,
    pub started_at: String,
    pub output: Option<&'a Path>,
    pub total_entries: Option<usize>,
    pub ok: bool,
}

pub fn record_run(conn: &Connection, entry: &RunEntry, report: &RunReport) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    let skipped = report.outcomes.len() - report.ingested();
    tx.execute(
        "INSERT INTO runs (run_id, mode, started_at, discovered, ingested, skipped, total_entries, output, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            entry.run_id,
            entry.mode,
            entry.started_at,
            report.discovered as i64,
            report.ingested() as i64,
            skipped as i64,
            entry.total_entries.map(|n| n as i64),
            entry.output.map(|p| p.display().to_string()),
            if entry.ok { "ok" } else { "failed" },
        ],
    )?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO run_files (run_id, file, outcome, sequence, rows, date, date_origin, detail)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for outcome in &report.outcomes {
            match outcome {
                FileOutcome::Ingested {
                    file,
                    sequence,
                    rows,
                    date,
                    date_origin,
                } => {
                    stmt.execute(rusqlite::params![
                        entry.run_id,
                        file,
                        "ingested",
                        *sequence as i64,
                        *rows as i64,
                        date,
                        date_origin.as_str(),
                        Option::<String>::None,
                    ])?;
                }
                FileOutcome::Skipped { file, reason } => {
                    stmt.execute(rusqlite::params![
                        entry.run_id,
                        file,
                        reason.kind(),
                        Option::<i64>::None,
                        Option::<i64>::None,
                        Option::<String>::None,
                        Option::<String>::None,
                        reason.to_string(),
                    ])?;
                }
            }
        }
    }
    tx.commit()?;
    Ok(())
}

pub struct RunRow {
    pub run_id: String,
    pub mode: String,
    pub started_at: String,
    pub discovered: i64,
    pub ingested: i64,
    pub skipped: i64,
    pub total_entries: Option<i64>,
    pub status: String,
}

pub fn fetch_recent(conn: &Connection, limit: usize) -> Result<Vec<RunRow>> {
    let mut stmt = conn.prepare(
        "SELECT run_id, mode, started_at, discovered, ingested, skipped, total_entries, status
         FROM runs ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit as i64], |row| {
            Ok(RunRow {
                run_id: row.get(0)?,
                mode: row.get(1)?,
                started_at: row.get(2)?,
                discovered: row.get(3)?,
                ingested: row.get(4)?,
                skipped: row.get(5)?,
                total_entries: row.get(6)?,
                status: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Skipped files of one run: (file, outcome, detail).
pub fn fetch_skipped(conn: &Connection, run_id: &str) -> Result<Vec<(String, String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT file, outcome, COALESCE(detail, '') FROM run_files
         WHERE run_id = ?1 AND outcome != 'ingested' ORDER BY id",
    )?;
    let rows = stmt
        .query_map([run_id], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Tests ──
