use super::*;
use crate::libquiz::bank::{validate, RawTable};
use crate::libquiz::flag::{FlagError, NullFlagSink};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io;

const BANK: &str = "\
Question,Option_A,Option_B,Option_C,Option_D,Option_E,Correct_Answer,Explanation,Domain,Source
Duty to warn applies when?,Always,Serious threat,Never,,,B,Tarasoff,Ethics,Case law
Which test measures IQ?,WAIS,MMPI,,,,A,,Assessment,
Confidentiality may be broken when?,Client asks,Court order,Boredom,,,B,,Ethics,Code
Broken row,a,b,,,,F,,Ethics,
";

#[derive(Default)]
struct RecordingSink {
    flags: Vec<FlagRecord>,
}

impl FlagSink for RecordingSink {
    fn append(&mut self, flag: &FlagRecord) -> Result<(), FlagError> {
        self.flags.push(flag.clone());
        Ok(())
    }
}

struct OfflineSink;

impl FlagSink for OfflineSink {
    fn append(&mut self, _: &FlagRecord) -> Result<(), FlagError> {
        Err(FlagError::Io(io::Error::new(io::ErrorKind::Other, "offline")))
    }
}

fn bank() -> Bank {
    validate(&RawTable::from_reader(BANK.as_bytes()).unwrap())
}

fn started(filter: &DomainFilter, count: usize) -> SessionState {
    let mut session = SessionState::new();
    session.start(&bank(), filter, count, &mut StdRng::seed_from_u64(17));
    session
}

fn wrong_letter(item: &QuizItem) -> String {
    item.options
        .iter()
        .find(|option| option.display_letter != item.correct_display_letter)
        .map(|option| option.display_letter.to_string())
        .unwrap()
}

#[test]
fn new_session_is_landing() {
    let session = SessionState::new();
    assert_eq!(session.phase(), Phase::Landing);
    assert!(session.current().is_none());
}

#[test]
fn ethics_quiz_is_clamped_and_scored() {
    let bank = bank();
    assert_eq!(bank.len(), 3);
    assert!(!bank.issues().is_empty());

    let mut session = SessionState::new();
    let phase = session.start(
        &bank,
        &DomainFilter::new(["Ethics"]),
        5,
        &mut StdRng::seed_from_u64(1),
    );
    assert_eq!(phase, Phase::InProgress);
    assert_eq!(session.total(), 2);

    while let Some(item) = session.current() {
        let correct = item.correct_display_letter.to_string();
        assert!(session.submit(&correct, Local::now()).unwrap().is_correct);
    }

    assert_eq!(session.phase(), Phase::Complete);
    assert_eq!(session.score(), 2);
    let summary = session.summary();
    assert_eq!((summary.score, summary.total), (2, 2));
    assert_eq!(summary.percent(), 100.0);
    assert_eq!(
        summary.by_domain.get(&Some(Domain::Ethics)),
        Some(&DomainTally {
            answered: 2,
            correct: 2
        })
    );
}

#[test]
fn score_counts_only_correct_submissions() {
    let mut session = started(&DomainFilter::default(), 3);
    let mut expected = 0;

    for turn in 0..3 {
        let item = session.current().unwrap();
        let choice = if turn == 1 {
            wrong_letter(item)
        } else {
            expected += 1;
            item.correct_display_letter.to_string()
        };
        session.submit(&choice, Local::now()).unwrap();
    }

    assert_eq!(session.score(), expected);
    assert_eq!(session.results().len(), 3);
    assert!(!session.results()[1].is_correct);
    assert!((session.summary().percent() - 200.0 / 3.0).abs() < 1e-9);
}

#[test]
fn lowercase_and_empty_submissions_are_wrong() {
    let mut session = started(&DomainFilter::default(), 2);

    let lowered = session.current().unwrap().correct_display_letter.as_str().to_lowercase();
    let result = session.submit(&lowered, Local::now()).unwrap();
    assert!(!result.is_correct);
    assert_eq!(result.chosen_text, "");

    let result = session.submit("", Local::now()).unwrap();
    assert!(!result.is_correct);
    assert!(result.is_unanswered());
    assert_eq!(session.score(), 0);
}

#[test]
fn result_records_chosen_and_correct_text() {
    let mut session = started(&DomainFilter::new(["Assessment"]), 1);
    let item = session.current().unwrap().clone();
    let wrong = wrong_letter(&item);

    let result = session.submit(&wrong, Local::now()).unwrap();
    assert_eq!(result.question, "Which test measures IQ?");
    assert_eq!(result.chosen_text, "MMPI");
    assert_eq!(result.correct_text, "WAIS");
    assert_eq!(result.correct_letter, item.correct_display_letter);
    assert_eq!(result.domain, Some(Domain::Assessment));
}

#[test]
fn submitting_after_completion_fails() {
    let mut session = started(&DomainFilter::new(["Assessment"]), 1);
    session.submit("A", Local::now()).unwrap();

    assert_eq!(session.phase(), Phase::Complete);
    assert_eq!(
        session.submit("A", Local::now()).unwrap_err(),
        SessionError::NotInProgress
    );
    assert_eq!(
        SessionState::new().submit("A", Local::now()).unwrap_err(),
        SessionError::NotInProgress
    );
}

#[test]
fn empty_selection_stays_on_landing() {
    let mut session = SessionState::new();
    let phase = session.start(
        &bank(),
        &DomainFilter::new(["Communication"]),
        10,
        &mut StdRng::seed_from_u64(3),
    );
    assert_eq!(phase, Phase::Landing);
    assert_eq!(session.total(), 0);
}

#[test]
fn restart_clears_everything() {
    let mut session = started(&DomainFilter::default(), 2);
    session.submit("A", Local::now()).unwrap();
    session
        .flag(0, "", Local::now(), &mut NullFlagSink)
        .unwrap();

    session.restart();
    assert_eq!(session.phase(), Phase::Landing);
    assert_eq!(session.score(), 0);
    assert!(session.results().is_empty());
    assert!(session.flagged().is_empty());
}

#[test]
fn starting_again_draws_a_fresh_quiz() {
    let mut session = started(&DomainFilter::default(), 3);
    session.submit("A", Local::now()).unwrap();

    session.start(&bank(), &DomainFilter::default(), 2, &mut StdRng::seed_from_u64(99));
    assert_eq!(session.index(), 0);
    assert_eq!(session.total(), 2);
    assert!(session.results().is_empty());
}

#[test]
fn flags_are_forwarded_once() {
    let mut session = started(&DomainFilter::default(), 2);
    session.submit("A", Local::now()).unwrap();
    let mut sink = RecordingSink::default();

    let outcome = session.flag(0, "  key looks wrong ", Local::now(), &mut sink);
    assert_eq!(outcome, Ok(FlagOutcome::Recorded));
    let outcome = session.flag(0, "again", Local::now(), &mut sink);
    assert_eq!(outcome, Ok(FlagOutcome::AlreadyFlagged));

    assert_eq!(sink.flags.len(), 1);
    assert_eq!(sink.flags[0].notes, "key looks wrong");
    assert_eq!(sink.flags[0].question, session.results()[0].question);
    assert_eq!(session.flagged().len(), 1);
}

#[test]
fn sink_failure_is_soft() {
    let mut session = started(&DomainFilter::default(), 2);
    session.submit("A", Local::now()).unwrap();

    let outcome = session.flag(0, "", Local::now(), &mut OfflineSink).unwrap();
    assert!(matches!(outcome, FlagOutcome::SinkFailed(_)));
    assert_eq!(session.flagged().len(), 1);

    assert_eq!(session.phase(), Phase::InProgress);
    assert!(session.submit("A", Local::now()).is_ok());
}

#[test]
fn flagging_unknown_result_fails() {
    let mut session = started(&DomainFilter::default(), 2);
    assert_eq!(
        session.flag(0, "", Local::now(), &mut NullFlagSink),
        Err(SessionError::UnknownResult(0))
    );
}
