use crate::libquiz::db::SqliteFlagSink;
use crate::libquiz::domain::Domain;
use chrono::{DateTime, Local};
use csv::WriterBuilder;
use log::{debug, info, warn};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const FLAG_COLUMNS: [&str; 5] = ["Timestamp", "Domain", "Question", "Source", "Notes"];

#[derive(Debug, Error)]
pub enum FlagError {
    #[error("flag database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("flag sheet error: {0}")]
    Csv(#[from] csv::Error),
    #[error("cannot write flag: {0}")]
    Io(#[from] io::Error),
}

/// A user report that a question may be inaccurate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlagRecord {
    pub flagged_at: DateTime<Local>,
    pub domain: Option<Domain>,
    pub question: String,
    pub source: String,
    pub notes: String,
}

impl FlagRecord {
    pub fn timestamp(&self) -> String {
        self.flagged_at.format("%Y-%m-%dT%H:%M:%S").to_string()
    }

    pub fn domain_label(&self) -> &str {
        self.domain.as_ref().map(Domain::label).unwrap_or("")
    }

    fn row(&self) -> [String; 5] {
        [
            self.timestamp(),
            self.domain_label().to_owned(),
            self.question.clone(),
            self.source.clone(),
            self.notes.clone(),
        ]
    }
}

/// Somewhere flagged questions get appended to. Failures are the caller's to swallow.
pub trait FlagSink {
    fn append(&mut self, flag: &FlagRecord) -> Result<(), FlagError>;
}

/// Used when nothing is configured. Accepts everything and keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullFlagSink;

impl FlagSink for NullFlagSink {
    fn append(&mut self, flag: &FlagRecord) -> Result<(), FlagError> {
        debug!("[Flag] No sink configured, dropping flag for {:?}", flag.question);
        Ok(())
    }
}

/// Appends flags to a spreadsheet-compatible CSV file, writing the header row on first use.
#[derive(Debug, Clone)]
pub struct CsvFlagSink {
    path: PathBuf,
}

impl CsvFlagSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvFlagSink { path: path.into() }
    }
}

impl FlagSink for CsvFlagSink {
    fn append(&mut self, flag: &FlagRecord) -> Result<(), FlagError> {
        let needs_header = match self.path.metadata() {
            Ok(metadata) => metadata.len() == 0,
            Err(_) => true,
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if needs_header {
            writer.write_record(FLAG_COLUMNS)?;
        }
        writer.write_record(flag.row())?;
        writer.flush()?;
        debug!("[Flag] Appended flag to {:?}", self.path);
        Ok(())
    }
}

/// Picks a sink from whatever is configured. A database that cannot be opened falls back to the
/// sheet, and with no sheet to the null sink.
pub fn open_sink(flag_db: Option<&Path>, flag_csv: Option<&Path>) -> Box<dyn FlagSink> {
    if let Some(path) = flag_db {
        match SqliteFlagSink::open(path) {
            Ok(sink) => {
                info!("[Flag] Logging flags to database {:?}", path);
                return Box::new(sink);
            }
            Err(err) => warn!("[Flag] Cannot open flag database {:?}: {}", path, err),
        }
    }
    if let Some(path) = flag_csv {
        info!("[Flag] Logging flags to sheet {:?}", path);
        return Box::new(CsvFlagSink::new(path));
    }
    debug!("[Flag] No flag sink configured.");
    Box::new(NullFlagSink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn flag(question: &str) -> FlagRecord {
        FlagRecord {
            flagged_at: Local.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap(),
            domain: Some(Domain::Ethics),
            question: question.to_owned(),
            source: "Code of Conduct".to_owned(),
            notes: "outdated, see 2024 revision".to_owned(),
        }
    }

    #[test]
    fn null_sink_accepts_silently() {
        assert!(NullFlagSink.append(&flag("Q")).is_ok());
    }

    #[test]
    fn csv_sink_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flags.csv");
        let mut sink = CsvFlagSink::new(&path);

        sink.append(&flag("First, with a comma")).unwrap();
        sink.append(&flag("Second")).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_owned).collect();
        assert_eq!(headers, FLAG_COLUMNS.to_vec());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "2025-03-14T09:26:53");
        assert_eq!(&rows[0][1], "Ethics");
        assert_eq!(&rows[0][2], "First, with a comma");
        assert_eq!(&rows[1][4], "outdated, see 2024 revision");
    }

    #[test]
    fn csv_sink_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = CsvFlagSink::new(dir.path().join("missing").join("flags.csv"));
        assert!(matches!(sink.append(&flag("Q")), Err(FlagError::Io(_))));
    }

    #[test]
    fn empty_flag_database_is_usable() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("flags.db");
        let sheet = dir.path().join("flags.csv");
        std::fs::File::create(&db).unwrap();

        let mut sink = open_sink(Some(db.as_path()), Some(sheet.as_path()));
        sink.append(&flag("Q")).unwrap();
        assert!(!sheet.exists());
    }

    #[test]
    fn unusable_flag_database_falls_back_to_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("flags.db");
        let sheet = dir.path().join("flags.csv");
        std::fs::write(&db, "this is not a database\n".repeat(100)).unwrap();

        let mut sink = open_sink(Some(db.as_path()), Some(sheet.as_path()));
        sink.append(&flag("Q")).unwrap();
        assert!(sheet.exists());
    }

    #[test]
    fn unconfigured_sink_is_null() {
        let mut sink = open_sink(None, None);
        assert!(sink.append(&flag("Q")).is_ok());
    }
}
