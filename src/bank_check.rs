use clap::Parser;
use colored::Colorize;
use env_logger::Env;
use log::{error, info};
use std::fmt;
use std::path::PathBuf;

#[allow(dead_code)]
mod libquiz;

use crate::libquiz::bank::{validate, IssueKind, RawTable};

#[derive(Parser, Debug)]
#[command(name = "Bank Check")]
#[command(version, about = "Checks an NPE Quiz question bank for broken rows", long_about = None)]
struct Args {
    #[arg(value_name = "FILE", default_value = "data/questions.csv")]
    bank: PathBuf,
    /// Fail on missing columns instead of treating them as empty.
    #[arg(short, long)]
    strict: bool,
    #[arg(short, long, default_value = "error")]
    log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Error,
    Warn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Finding {
    level: Level,
    message: String,
}

impl Finding {
    fn error(message: String) -> Finding {
        Finding {
            level: Level::Error,
            message,
        }
    }

    fn warn(message: String) -> Finding {
        Finding {
            level: Level::Warn,
            message,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            Level::Error => write!(f, "[ERROR] {}", self.message),
            Level::Warn => write!(f, "[WARN] {}", self.message),
        }
    }
}

#[derive(Debug, Default)]
struct Report {
    findings: Vec<Finding>,
    rows: usize,
    usable: usize,
    /// Strict mode stopped before looking at any row.
    aborted: bool,
}

impl Report {
    fn has_errors(&self) -> bool {
        self.findings.iter().any(|f| f.level == Level::Error)
    }
}

fn check(table: &RawTable, strict: bool) -> Report {
    let mut report = Report {
        rows: table.len(),
        ..Report::default()
    };

    let missing = table.missing_columns();
    for column in &missing {
        if strict {
            report
                .findings
                .push(Finding::error(format!("Missing column: {}", column)));
        } else {
            report.findings.push(Finding::warn(format!(
                "Missing column: {} (treated as empty)",
                column
            )));
        }
    }
    if strict && !missing.is_empty() {
        report.aborted = true;
        return report;
    }
    if table.is_empty() {
        report
            .findings
            .push(Finding::warn("No question rows".to_owned()));
    }

    let bank = validate(table);
    report.usable = bank.len();
    for issue in bank.issues() {
        let detail = match &issue.kind {
            IssueKind::CorrectAnswerOutOfRange { found } => format!(": {:?}", found),
            IssueKind::CorrectAnswerEmptyOption { letter } => format!(" (Option_{})", letter),
            _ => String::new(),
        };
        let message = format!("Row {}: {}{}", issue.row, issue.kind, detail);
        if issue.kind.is_blocking() {
            report.findings.push(Finding::error(message));
        } else {
            report.findings.push(Finding::warn(message));
        }
    }
    report
}

fn main() {
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(args.log_level.as_str()))
        .init();

    let table = match RawTable::open(&args.bank) {
        Ok(table) => table,
        Err(err) => {
            error!("[Bank] {}", err);
            println!("{}", format!("[ERROR] {}", err).red());
            std::process::exit(1);
        }
    };
    info!("Checking {} rows in {:?}", table.len(), args.bank);

    let report = check(&table, args.strict);
    for finding in &report.findings {
        match finding.level {
            Level::Error => println!("{}", finding.to_string().red()),
            Level::Warn => println!("{}", finding.to_string().yellow()),
        }
    }
    if report.aborted {
        std::process::exit(1);
    }

    println!("{} of {} rows usable.", report.usable, report.rows);
    if report.has_errors() {
        println!("{}", "Done with errors.".red());
        std::process::exit(1);
    }
    println!("{}", "Done with no blocking errors.".green());
}
