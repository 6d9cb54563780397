use crate::libquiz::bank::Bank;
use crate::libquiz::db::Flag;
use crate::libquiz::flag::FlagSink;
use crate::libquiz::session::{FlagOutcome, SessionState};
use crate::Choice;
use chrono::Local;
use colored::Colorize;
use log::{debug, warn};
use std::io::{self, Write};
use text_io::read;

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "—"
    } else {
        value
    }
}

fn prompt(text: &str) -> String {
    print!("{} ", text.cyan());
    let _ = io::stdout().flush();
    let line: String = read!("{}\n");
    line.trim().to_owned()
}

pub fn print_issues(bank: &Bank) {
    if bank.issues().is_empty() {
        println!("{}", "No issues found in the question bank.".green());
        return;
    }
    for issue in bank.issues() {
        let line = format!("Row {}: {}", issue.row, issue.kind);
        if issue.kind.is_blocking() {
            println!("{}", format!("✘ {} (dropped)", line).red());
        } else {
            println!("{}", format!("! {}", line).yellow());
        }
    }
}

pub fn print_flags(flags: &[Flag]) {
    if flags.is_empty() {
        println!("{}", "No questions flagged.".green());
        return;
    }
    for flag in flags {
        println!(
            "{} {}",
            format!("#{}", flag.id).cyan().bold(),
            flag.question.as_str().bold()
        );
        println!(
            "    {}",
            format!(
                "Flagged: {}  |  Domain: {}  |  Source: {}",
                flag.flagged_at,
                or_dash(&flag.domain),
                or_dash(&flag.source)
            )
            .dimmed()
        );
        if !flag.notes.is_empty() {
            println!("    Notes: {}", flag.notes);
        }
    }
}

/// Runs the question loop. Returns `false` if the user quit before the end.
pub fn quiz_loop(session: &mut SessionState) -> bool {
    let total = session.total();
    while let Some(item) = session.current() {
        let leading = format!("{}/{}. ", session.index() + 1, total);
        println!(
            "{}{}",
            leading.cyan(),
            item.record.question.as_str().black().bold().on_white()
        );
        let indent = " ".repeat(leading.len());
        println!(
            "{}{}",
            indent,
            format!(
                "Domain: {}  |  Source: {}",
                or_dash(item.record.domain_label()),
                or_dash(&item.record.source)
            )
            .dimmed()
        );
        for option in &item.options {
            println!(
                "{}{}. {}",
                indent,
                option.display_letter.as_str().bold(),
                option.text
            );
        }

        let last = item
            .options
            .last()
            .map(|option| option.display_letter.as_str())
            .unwrap_or("A");
        let choice_string = prompt(&format!(
            "Answer (A-{}, q to quit prematurely and anything else if you don't know):",
            last
        ));
        let choice = Choice::from_str(item.options.len(), &choice_string);
        debug!("choice: {:?}", choice);

        let submitted = match choice {
            Choice::Option(letter) => letter.as_str().to_owned(),
            Choice::DontKnow => String::new(),
            Choice::Quit => {
                println!("{}", "Quitting Early!".cyan());
                return false;
            }
        };

        let (is_correct, correct_letter, correct_text) =
            match session.submit(&submitted, Local::now()) {
                Ok(result) => (
                    result.is_correct,
                    result.correct_letter,
                    result.correct_text.clone(),
                ),
                Err(err) => {
                    warn!("[Session] {}", err);
                    return false;
                }
            };
        let score = session.score();
        if is_correct {
            println!(
                "{}",
                format!("Correct!: {} -> {}", score - 1, score).bright_green()
            );
        } else {
            println!("{}", format!("Incorrect!: {} -> {}", score, score).bright_red());
            println!(
                "{}",
                format!("The correct choice was {}. {}", correct_letter, correct_text).green()
            );
        }
    }
    true
}

pub fn review(session: &mut SessionState, sink: &mut dyn FlagSink) {
    let summary = session.summary();
    println!("{}", "==========> Quiz complete! <==========".cyan());
    println!(
        "{}",
        format!(
            "Score: {}/{} ({:.1}%), {} answered",
            summary.score,
            summary.total,
            summary.percent(),
            summary.answered
        )
        .bold()
    );
    for (domain, tally) in &summary.by_domain {
        let label = domain.as_ref().map(|d| d.label()).unwrap_or("Unlabeled");
        println!("  {}: {}/{}", label, tally.correct, tally.answered);
    }

    println!();
    println!("{}", "Review your answers".cyan().bold());
    for (i, result) in session.results().iter().enumerate() {
        let tick = if result.is_correct {
            "✔".bright_green()
        } else {
            "✘".bright_red()
        };
        println!("{} {}", format!("Q{}.", i + 1).cyan().bold(), result.question);
        println!(
            "    {}",
            format!(
                "Domain: {}  |  Source: {}",
                result.domain.as_ref().map(|d| d.label()).unwrap_or("—"),
                or_dash(&result.source)
            )
            .dimmed()
        );
        if result.is_unanswered() {
            println!("    Your answer {}: (no answer)", tick);
        } else {
            println!(
                "    Your answer {}: {}. {}",
                tick, result.chosen_letter, result.chosen_text
            );
        }
        println!(
            "    {}",
            format!("Correct: {}. {}", result.correct_letter, result.correct_text)
                .black()
                .on_green()
        );
        if !result.explanation.is_empty() {
            println!("    Explanation: {}", result.explanation);
        }
    }

    println!();
    flag_loop(session, sink);

    println!("{}", "Flagged inaccurate questions".cyan().bold());
    if session.flagged().is_empty() {
        println!("No questions flagged.");
    } else {
        for flagged in session.flagged() {
            println!(
                "  [{}] {} ({})",
                flagged.domain.as_ref().map(|d| d.label()).unwrap_or("—"),
                flagged.question,
                or_dash(&flagged.source)
            );
        }
    }
}

fn flag_loop(session: &mut SessionState, sink: &mut dyn FlagSink) {
    let answered = session.results().len();
    loop {
        let input = prompt(&format!(
            "Flag a question as inaccurate (1-{}), or press enter to finish:",
            answered
        ));
        if input.is_empty() || input == "q" {
            return;
        }
        let Some(result_index) = input
            .parse::<usize>()
            .ok()
            .and_then(|number| number.checked_sub(1))
        else {
            println!("{}", "Not a question number.".bright_red());
            continue;
        };
        let notes = prompt("Notes (optional):");

        match session.flag(result_index, &notes, Local::now(), sink) {
            Ok(FlagOutcome::Recorded) => println!(
                "{}",
                "Flagged. Thanks for helping keep the bank clean!".bright_green()
            ),
            Ok(FlagOutcome::AlreadyFlagged) => {
                println!("{}", "Already flagged.".yellow())
            }
            Ok(FlagOutcome::SinkFailed(reason)) => println!(
                "{}",
                format!("Flagged for this session, but it could not be logged: {}", reason)
                    .yellow()
            ),
            Err(err) => println!("{}", err.to_string().bright_red()),
        }
    }
}

pub fn ask_restart() -> bool {
    matches!(
        prompt("Restart with a fresh draw? (y/N)").to_lowercase().as_str(),
        "y" | "yes"
    )
}
