use crate::libquiz::domain::{Domain, DomainFilter};
use crate::libquiz::letter::Letter;
use csv::ReaderBuilder;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;


pub const REQUIRED_COLUMNS: [&str; 10] = [
    "Question",
    "Option_A",
    "Option_B",
    "Option_C",
    "Option_D",
    "Option_E",
    "Correct_Answer",
    "Explanation",
    "Domain",
    "Source",
];

const LEGACY_TERMS: [(&str, &str); 1] = [("WISC-IV", "WISC-V")];

#[derive(Debug, Error)]
pub enum BankError {
    #[error("cannot open question bank {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("malformed question bank: {0}")]
    Csv(#[from] csv::Error),
}

/// The bank exactly as read from disk: header names plus untyped string cells.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn open(path: &Path) -> Result<RawTable, BankError> {
        let file = File::open(path).map_err(|source| BankError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<RawTable, BankError> {
        let mut csv_reader = ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = csv_reader
            .headers()?
            .iter()
            .map(|header| header.trim_start_matches('\u{feff}').trim().to_owned())
            .collect();

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_owned).collect());
        }

        Ok(RawTable { headers, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn missing_columns(&self) -> Vec<&'static str> {
        REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|column| self.column_index(column).is_none())
            .collect()
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == column)
    }

    /// Looks through every cell of the row, extra columns included.
    pub fn row_contains(&self, row: usize, needle: &str) -> bool {
        self.rows
            .get(row)
            .is_some_and(|cells| cells.iter().any(|cell| cell.contains(needle)))
    }

    /// Missing columns and short rows both read as empty cells.
    pub fn cell(&self, row: usize, column: &str) -> &str {
        self.column_index(column)
            .and_then(|index| self.rows.get(row)?.get(index))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Collapses whitespace runs, trims, and blanks out stringified missing values.
pub fn normalize(cell: &str) -> String {
    let collapsed = cell.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed == "nan" {
        String::new()
    } else {
        collapsed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionRecord {
    /// Zero-based data row in the source table.
    pub row: usize,
    pub question: String,
    /// Only options with text are present.
    pub options: BTreeMap<Letter, String>,
    pub correct_letter: Letter,
    pub explanation: String,
    pub domain: Option<Domain>,
    pub source: String,
}

impl QuestionRecord {
    pub fn option(&self, letter: Letter) -> Option<&str> {
        self.options.get(&letter).map(String::as_str)
    }

    /// Non-empty options in A–E order.
    pub fn present_options(&self) -> impl Iterator<Item = (Letter, &str)> {
        self.options
            .iter()
            .map(|(letter, text)| (*letter, text.as_str()))
    }

    pub fn correct_text(&self) -> &str {
        self.option(self.correct_letter).unwrap_or("")
    }

    pub fn domain_label(&self) -> &str {
        self.domain.as_ref().map(Domain::label).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    MissingQuestion,
    DuplicateStem,
    CorrectAnswerOutOfRange { found: String },
    CorrectAnswerEmptyOption { letter: Letter },
    LegacyTerm {
        found: &'static str,
        suggested: &'static str,
    },
}

impl IssueKind {
    /// Blocking issues are the ones that cost the row its place in the bank.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            IssueKind::MissingQuestion
                | IssueKind::CorrectAnswerOutOfRange { .. }
                | IssueKind::CorrectAnswerEmptyOption { .. }
        )
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::MissingQuestion => f.write_str("Missing Question"),
            IssueKind::DuplicateStem => f.write_str("Duplicate Question stem"),
            IssueKind::CorrectAnswerOutOfRange { .. } => f.write_str("Correct_Answer not in A–E"),
            IssueKind::CorrectAnswerEmptyOption { .. } => {
                f.write_str("Correct_Answer points to empty/missing option")
            }
            IssueKind::LegacyTerm { found, suggested } => {
                write!(f, "Found '{}' (consider {})", found, suggested)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub row: usize,
    pub kind: IssueKind,
}

impl Issue {
    fn new(row: usize, kind: IssueKind) -> Issue {
        Issue { row, kind }
    }
}

/// Validated question bank. Built once and only read afterwards.
#[derive(Debug, Clone, Default)]
pub struct Bank {
    records: Vec<QuestionRecord>,
    issues: Vec<Issue>,
}

impl Bank {
    pub fn open(source: &Path) -> Result<Bank, BankError> {
        let now = Instant::now();
        let table = RawTable::open(source)?;
        debug!("[Bank] Read {} rows from {:?}.", table.len(), source);
        debug!("[Bank] Columns: {:?}", table.headers());
        if table.is_empty() {
            warn!("[Bank] {:?} has no question rows.", source);
        }
        for column in table.missing_columns() {
            warn!("[Bank] Column {} is missing, treating it as empty.", column);
        }

        let bank = validate(&table);
        info!(
            "[Bank] {} usable questions, {} issues ({} blocking).",
            bank.records.len(),
            bank.issues.len(),
            bank.blocking_issue_count()
        );
        debug!("[Bank] Loaded bank in {} ms.", now.elapsed().as_millis());
        Ok(bank)
    }

    pub fn records(&self) -> &[QuestionRecord] {
        &self.records
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn blocking_issue_count(&self) -> usize {
        self.issues.iter().filter(|i| i.kind.is_blocking()).count()
    }

    /// How many records a quiz with this filter could draw from.
    pub fn available(&self, filter: &DomainFilter) -> usize {
        self.records
            .iter()
            .filter(|record| filter.accepts(record.domain))
            .count()
    }
}

pub fn validate(table: &RawTable) -> Bank {
    let mut records = Vec::new();
    let mut issues = Vec::new();
    let mut seen = HashSet::new();

    for row in 0..table.len() {
        let field = |column: &str| normalize(table.cell(row, column));

        let question = field("Question");
        if question.is_empty() {
            issues.push(Issue::new(row, IssueKind::MissingQuestion));
            continue;
        }
        if !seen.insert(question.to_lowercase()) {
            issues.push(Issue::new(row, IssueKind::DuplicateStem));
        }

        let raw_correct = field("Correct_Answer").to_uppercase();
        let Some(correct_letter) = Letter::parse(&raw_correct) else {
            issues.push(Issue::new(
                row,
                IssueKind::CorrectAnswerOutOfRange { found: raw_correct },
            ));
            continue;
        };

        let options: BTreeMap<Letter, String> = Letter::ALL
            .iter()
            .map(|letter| (*letter, field(letter.column())))
            .filter(|(_, text)| !text.is_empty())
            .collect();
        if !options.contains_key(&correct_letter) {
            issues.push(Issue::new(
                row,
                IssueKind::CorrectAnswerEmptyOption {
                    letter: correct_letter,
                },
            ));
            continue;
        }

        records.push(QuestionRecord {
            row,
            question,
            options,
            correct_letter,
            explanation: field("Explanation"),
            domain: Domain::canonicalize(&field("Domain")),
            source: field("Source"),
        });
    }

    for record in &records {
        for (found, suggested) in LEGACY_TERMS {
            if table.row_contains(record.row, found) {
                issues.push(Issue::new(
                    record.row,
                    IssueKind::LegacyTerm { found, suggested },
                ));
            }
        }
    }

    for issue in &issues {
        if issue.kind.is_blocking() {
            warn!("[Bank] Row {}: {} (dropped)", issue.row, issue.kind);
        } else {
            debug!("[Bank] Row {}: {}", issue.row, issue.kind);
        }
    }

    Bank { records, issues }
}
