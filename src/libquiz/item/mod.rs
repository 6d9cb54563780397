use crate::libquiz::bank::QuestionRecord;
use crate::libquiz::domain::DomainFilter;
use crate::libquiz::letter::Letter;
use log::{debug, warn};
use rand::seq::{index, SliceRandom};
use rand::Rng;
use serde::Serialize;
use std::time::Instant;


macro_rules! extract_or_continue {
    ($field:expr, $warn_msg:expr $(, $args:expr)*) => {
        match $field {
            None => {
                warn!($warn_msg $(, $args)*);
                continue;
            }
            Some(value) => value,
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayOption {
    pub display_letter: Letter,
    pub source_letter: Letter,
    pub text: String,
}

/// One question as presented: options in shuffled order, re-lettered from A.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizItem {
    pub record: QuestionRecord,
    pub options: Vec<DisplayOption>,
    pub correct_display_letter: Letter,
}

impl QuizItem {
    /// Looks an option up by the label the user sees. Exact match only.
    pub fn option(&self, display_letter: &str) -> Option<&DisplayOption> {
        self.options
            .iter()
            .find(|option| option.display_letter.as_str() == display_letter)
    }

    pub fn correct_option(&self) -> Option<&DisplayOption> {
        self.options
            .iter()
            .find(|option| option.display_letter == self.correct_display_letter)
    }

    pub fn correct_text(&self) -> &str {
        self.correct_option()
            .map(|option| option.text.as_str())
            .unwrap_or("")
    }

    pub fn is_correct(&self, submitted: &str) -> bool {
        submitted == self.correct_display_letter.as_str()
    }
}

/// Uniformly permutes the record's non-empty options and re-letters them densely from A.
pub fn shuffle_options<R: Rng + ?Sized>(record: &QuestionRecord, rng: &mut R) -> Vec<DisplayOption> {
    let mut present: Vec<(Letter, &str)> = record.present_options().collect();
    present.shuffle(rng);

    Letter::ALL
        .iter()
        .zip(present)
        .map(|(display_letter, (source_letter, text))| DisplayOption {
            display_letter: *display_letter,
            source_letter,
            text: text.to_owned(),
        })
        .collect()
}

/// `None` only when the record's correct option is missing, which validation rules out.
pub fn build_item<R: Rng + ?Sized>(record: QuestionRecord, rng: &mut R) -> Option<QuizItem> {
    let options = shuffle_options(&record, rng);
    let correct_display_letter = options
        .iter()
        .find(|option| option.source_letter == record.correct_letter)
        .map(|option| option.display_letter)?;

    Some(QuizItem {
        record,
        options,
        correct_display_letter,
    })
}

/// Draws up to `count` records passing `filter`, uniformly and without replacement.
pub fn select_records<'a, R: Rng + ?Sized>(
    records: &'a [QuestionRecord],
    filter: &DomainFilter,
    count: usize,
    rng: &mut R,
) -> Vec<&'a QuestionRecord> {
    let eligible: Vec<&QuestionRecord> = records
        .iter()
        .filter(|record| filter.accepts(record.domain))
        .collect();
    if eligible.is_empty() {
        debug!("[Setup] No records match {:?}.", filter);
        return Vec::new();
    }

    let count = count.min(eligible.len());
    debug!(
        "[Setup] Drawing {} of {} eligible records.",
        count,
        eligible.len()
    );
    index::sample(rng, eligible.len(), count)
        .into_iter()
        .map(|i| eligible[i])
        .collect()
}

pub fn build_items<R: Rng + ?Sized>(
    records: &[QuestionRecord],
    filter: &DomainFilter,
    count: usize,
    rng: &mut R,
) -> Vec<QuizItem> {
    let now = Instant::now();
    let selected = select_records(records, filter, count, rng);

    let mut items = Vec::with_capacity(selected.len());
    for record in selected {
        let row = record.row;
        let item = extract_or_continue!(
            build_item(record.clone(), rng),
            "[Setup] Row {} has no option for its correct answer! Skipping...",
            row
        );
        items.push(item);
    }

    debug!(
        "[Setup] Initialized {} items in {} ms.",
        items.len(),
        now.elapsed().as_millis()
    );
    items
}
