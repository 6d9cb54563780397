use clap::Parser;
use colored::Colorize;
use env_logger::Env;
use log::{debug, error, info, warn};
use rusqlite::Connection;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

mod cli;
mod libquiz;

use crate::libquiz::bank::{Bank, BankError};
use crate::libquiz::db::{Flag, SqliteFlagSink};
use crate::libquiz::domain::{Domain, DomainFilter};
use crate::libquiz::flag;
use crate::libquiz::letter::Letter;
use crate::libquiz::session::{Phase, SessionState};

#[derive(Debug, PartialEq)]
enum Choice {
    Option(Letter),
    DontKnow,
    Quit,
}

#[derive(Parser, Debug)]
#[command(name = "NPE Quiz")]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, value_name = "FILE", default_value = "data/questions.csv")]
    bank: PathBuf,
    /// Repeat to draw from several domains. Leave out (or pass "All") for every domain.
    #[arg(short, long = "domain", value_name = "DOMAIN")]
    domains: Vec<String>,
    #[arg(short, long, default_value = "10", value_parser = clap::value_parser!(u32).range(1..))]
    question_count: u32,
    #[arg(long, value_name = "FILE", env = "NPE_QUIZ_FLAG_DB")]
    flag_db: Option<PathBuf>,
    #[arg(long, value_name = "FILE", env = "NPE_QUIZ_FLAG_CSV")]
    flag_csv: Option<PathBuf>,
    /// Write the answer history as JSON when the quiz ends.
    #[arg(short, long, value_name = "FILE")]
    results: Option<PathBuf>,
    #[arg(long)]
    show_issues: bool,
    /// Print the questions flagged in --flag-db (narrowed by --domain) and exit.
    #[arg(long)]
    list_flags: bool,
    #[arg(short, long, default_value = "error")]
    log_level: String,
}

impl Choice {
    fn from_str(options_count: usize, input: &str) -> Choice {
        match input {
            "q" | "Q" => Choice::Quit,
            input => {
                let letter = match input.parse::<usize>() {
                    Ok(num) => num.checked_sub(1).and_then(Letter::from_index),
                    Err(_) => Letter::parse(&input.to_uppercase()),
                };
                match letter {
                    Some(letter) if letter.index() < options_count => Choice::Option(letter),
                    Some(_) => {
                        println!(
                            "{}",
                            format!("There are only {} options available!", options_count)
                                .bright_red()
                        );
                        Choice::DontKnow
                    }
                    None => Choice::DontKnow,
                }
            }
        }
    }
}

#[derive(Debug, Error)]
enum Error {
    #[error("cannot load question bank: {0}")]
    Bank(#[from] BankError),
    #[error("cannot write results: {0}")]
    ResultsIo(#[from] io::Error),
    #[error("cannot serialize results: {0}")]
    ResultsJson(#[from] serde_json::Error),
    #[error("cannot read flag database: {0}")]
    FlagDb(#[from] rusqlite::Error),
}

fn main() -> Result<(), Error> {
    //INIT START
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(args.log_level.as_str()))
        .init();

    let filter = DomainFilter::new(args.domains.iter().map(String::as_str));
    if args.list_flags {
        let Some(path) = &args.flag_db else {
            println!("{}", "--list-flags needs --flag-db or NPE_QUIZ_FLAG_DB.".bright_red());
            return Ok(());
        };
        return list_flags(path, &filter);
    }

    let bank = match Bank::open(&args.bank) {
        Ok(bank) => bank,
        Err(err) => {
            error!("[Bank] {}", err);
            println!(
                "{}",
                format!("Could not load the question bank at {:?}.", args.bank).bright_red()
            );
            return Err(err.into());
        }
    };
    if args.show_issues {
        cli::print_issues(&bank);
    } else if !bank.issues().is_empty() {
        println!(
            "{}",
            format!(
                "{} issues found in the question bank ({} rows dropped). Run with --show-issues for details.",
                bank.issues().len(),
                bank.blocking_issue_count()
            )
            .yellow()
        );
    }

    if bank.is_empty() {
        println!("{}", "The question bank has no usable questions.".yellow());
        return Ok(());
    }
    let available = bank.available(&filter);
    if available == 0 {
        warn!("[Setup] No questions match {:?}.", args.domains);
        let choices: Vec<&str> = Domain::ALL.iter().map(Domain::label).collect();
        println!(
            "{}",
            "No questions match the selected domains. Pick another domain or fix the bank!"
                .yellow()
        );
        println!("Available domains: All, {}", choices.join(", "));
        return Ok(());
    }
    let question_count = (args.question_count as usize).min(available);
    debug!(
        "[Setup] {} questions available, asking {}.",
        available, question_count
    );

    let mut sink = flag::open_sink(args.flag_db.as_deref(), args.flag_csv.as_deref());
    let title = if filter.is_all() {
        "All domains".to_owned()
    } else {
        args.domains.join(", ")
    };
    // INIT DONE

    let mut session = SessionState::new();
    loop {
        if session.start(&bank, &filter, question_count, &mut rand::rng()) == Phase::Landing {
            println!("{}", "Nothing to ask.".yellow());
            return Ok(());
        }
        println!(
            "{}",
            format!(
                "==========> {} ({} questions) <==========",
                title,
                session.total()
            )
            .cyan()
        );

        let finished = cli::quiz_loop(&mut session);
        if !session.results().is_empty() {
            cli::review(&mut session, sink.as_mut());
        }
        if let Some(path) = &args.results {
            export_results(path, &session)?;
        }
        if !finished || !cli::ask_restart() {
            break;
        }
        session.restart();
    }

    Ok(())
}

/// Flags in the selected domains, oldest first. Unlabeled flags only show up for "all".
fn flags_in(connection: &Connection, filter: &DomainFilter) -> rusqlite::Result<Vec<Flag>> {
    if filter.is_all() {
        return Flag::get_all(connection);
    }
    let mut flags = Vec::new();
    for domain in Domain::ALL.iter().filter(|d| filter.accepts(Some(**d))) {
        flags.extend(Flag::get_in_domain(connection, domain.label())?);
    }
    flags.sort_by_key(|flag| flag.id);
    Ok(flags)
}

fn list_flags(path: &Path, filter: &DomainFilter) -> Result<(), Error> {
    let sink = SqliteFlagSink::open(path)?;
    let flags = flags_in(sink.connection(), filter)?;
    debug!("[Flag] {} flags listed from {:?}.", flags.len(), path);
    cli::print_flags(&flags);
    sink.close()?;
    Ok(())
}

fn export_results(path: &Path, session: &SessionState) -> Result<(), Error> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, session.results())?;
    info!(
        "[Session] Wrote {} results to {:?}.",
        session.results().len(),
        path
    );
    Ok(())
}
