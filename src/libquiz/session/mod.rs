use crate::libquiz::bank::Bank;
use crate::libquiz::domain::{Domain, DomainFilter};
use crate::libquiz::flag::{FlagRecord, FlagSink};
use crate::libquiz::item::{build_items, QuizItem};
use crate::libquiz::letter::Letter;
use chrono::{DateTime, Local};
use log::{debug, info, warn};
use rand::Rng;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[cfg(test)]
mod tests;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no question is waiting for an answer")]
    NotInProgress,
    #[error("there is no answered question #{0}")]
    UnknownResult(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Landing,
    InProgress,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerResult {
    pub answered_at: DateTime<Local>,
    pub row: usize,
    pub domain: Option<Domain>,
    pub source: String,
    pub question: String,
    /// Exactly what was submitted; empty when the question was skipped.
    pub chosen_letter: String,
    pub chosen_text: String,
    pub correct_letter: Letter,
    pub correct_text: String,
    pub is_correct: bool,
    pub explanation: String,
}

impl AnswerResult {
    pub fn is_unanswered(&self) -> bool {
        self.chosen_letter.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlaggedQuestion {
    pub domain: Option<Domain>,
    pub question: String,
    pub source: String,
}

impl From<&AnswerResult> for FlaggedQuestion {
    fn from(result: &AnswerResult) -> Self {
        FlaggedQuestion {
            domain: result.domain,
            question: result.question.clone(),
            source: result.source.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagOutcome {
    Recorded,
    AlreadyFlagged,
    /// Kept in the session, but the sink refused it.
    SinkFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DomainTally {
    pub answered: usize,
    pub correct: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub score: usize,
    pub total: usize,
    pub answered: usize,
    pub by_domain: BTreeMap<Option<Domain>, DomainTally>,
}

impl Summary {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.score as f64 / self.total as f64 * 100.0
        }
    }
}

/// Everything one quiz-taker has going on. Owned by the caller and threaded through each step.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    items: Vec<QuizItem>,
    index: usize,
    score: usize,
    results: Vec<AnswerResult>,
    flagged: BTreeSet<FlaggedQuestion>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Throws away whatever was going on and draws a fresh quiz.
    pub fn start<R: Rng + ?Sized>(
        &mut self,
        bank: &Bank,
        filter: &DomainFilter,
        count: usize,
        rng: &mut R,
    ) -> Phase {
        *self = SessionState {
            items: build_items(bank.records(), filter, count, rng),
            ..SessionState::default()
        };
        info!(
            "[Session] Started quiz with {} questions (requested {}).",
            self.items.len(),
            count
        );
        self.phase()
    }

    pub fn restart(&mut self) {
        debug!("[Session] Restarting.");
        *self = SessionState::default();
    }

    pub fn phase(&self) -> Phase {
        if self.items.is_empty() {
            Phase::Landing
        } else if self.index >= self.items.len() {
            Phase::Complete
        } else {
            Phase::InProgress
        }
    }

    pub fn current(&self) -> Option<&QuizItem> {
        self.items.get(self.index)
    }

    /// Scores `choice` against the current item and moves on. Matching is exact, so callers
    /// wanting lenient input must uppercase it themselves.
    pub fn submit(
        &mut self,
        choice: &str,
        answered_at: DateTime<Local>,
    ) -> Result<&AnswerResult, SessionError> {
        let item = self.items.get(self.index).ok_or(SessionError::NotInProgress)?;
        let is_correct = item.is_correct(choice);
        let record = &item.record;
        let result = AnswerResult {
            answered_at,
            row: record.row,
            domain: record.domain,
            source: record.source.clone(),
            question: record.question.clone(),
            chosen_letter: choice.to_owned(),
            chosen_text: item
                .option(choice)
                .map(|option| option.text.clone())
                .unwrap_or_default(),
            correct_letter: item.correct_display_letter,
            correct_text: item.correct_text().to_owned(),
            is_correct,
            explanation: record.explanation.clone(),
        };
        debug!(
            "[Session] Q{} answered {:?}, correct is {} ({}).",
            self.index + 1,
            choice,
            result.correct_letter,
            if is_correct { "hit" } else { "miss" }
        );

        if is_correct {
            self.score += 1;
        }
        self.index += 1;
        self.results.push(result);
        Ok(&self.results[self.results.len() - 1])
    }

    /// Marks an answered question as inaccurate and forwards it to `sink`. A flag that the sink
    /// rejects still counts for the session.
    pub fn flag(
        &mut self,
        result_index: usize,
        notes: &str,
        flagged_at: DateTime<Local>,
        sink: &mut dyn FlagSink,
    ) -> Result<FlagOutcome, SessionError> {
        let result = self
            .results
            .get(result_index)
            .ok_or(SessionError::UnknownResult(result_index))?;
        if !self.flagged.insert(FlaggedQuestion::from(result)) {
            return Ok(FlagOutcome::AlreadyFlagged);
        }

        let record = FlagRecord {
            flagged_at,
            domain: result.domain,
            question: result.question.clone(),
            source: result.source.clone(),
            notes: notes.trim().to_owned(),
        };
        match sink.append(&record) {
            Ok(()) => {
                info!("[Flag] Flagged row {}.", result.row);
                Ok(FlagOutcome::Recorded)
            }
            Err(err) => {
                warn!("[Flag] Could not log flag for row {}: {}", result.row, err);
                Ok(FlagOutcome::SinkFailed(err.to_string()))
            }
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn score(&self) -> usize {
        self.score
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn results(&self) -> &[AnswerResult] {
        &self.results
    }

    pub fn flagged(&self) -> &BTreeSet<FlaggedQuestion> {
        &self.flagged
    }

    pub fn summary(&self) -> Summary {
        let mut by_domain: BTreeMap<Option<Domain>, DomainTally> = BTreeMap::new();
        for result in &self.results {
            let tally = by_domain.entry(result.domain).or_default();
            tally.answered += 1;
            if result.is_correct {
                tally.correct += 1;
            }
        }
        Summary {
            score: self.score,
            total: self.total(),
            answered: self.results.len(),
            by_domain,
        }
    }
}
