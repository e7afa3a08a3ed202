//! Closing a round: rating histogram and shuffled result items.

use std::collections::HashMap;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::action::Note;
use crate::session::Submission;

/// Number of histogram buckets, one per rating 0..=5.
pub const HISTOGRAM_BUCKETS: usize = 6;

/// Rating counts indexed by note value.
pub type Histogram = [u32; HISTOGRAM_BUCKETS];

/// Outcome of aggregating one round of submissions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregate {
    /// Display strings in random order.
    pub items: Vec<String>,
    /// `None` when nobody rated this round.
    pub histogram: Option<Histogram>,
}

/// Count notes per rating. Returns `None` when no submission carried one.
pub fn histogram<'a, I>(submissions: I) -> Option<Histogram>
where
    I: IntoIterator<Item = &'a Submission>,
{
    let mut counts: Histogram = [0; HISTOGRAM_BUCKETS];
    for note in submissions.into_iter().filter_map(|s| s.note) {
        if let Some(slot) = counts.get_mut(usize::from(note.value())) {
            *slot += 1;
        }
    }
    counts.iter().any(|&c| c > 0).then_some(counts)
}

/// Render one submission for the result list.
///
/// Notes are only embedded when the round produced a histogram.
pub fn display_item(submission: &Submission, with_notes: bool) -> String {
    match submission.note {
        Some(note) if with_notes => format!("{} [{note}/{}]", submission.text, Note::MAX),
        _ => submission.text.clone(),
    }
}

/// Aggregate pending submissions. Blank texts are left out of `items` but
/// still count towards the histogram.
pub fn aggregate<R>(pending: &HashMap<String, Submission>, rng: &mut R) -> Aggregate
where
    R: Rng + ?Sized,
{
    let histogram = histogram(pending.values());
    let mut items: Vec<String> = pending
        .values()
        .filter(|s| !s.text.trim().is_empty())
        .map(|s| display_item(s, histogram.is_some()))
        .collect();
    items.shuffle(rng);
    Aggregate { items, histogram }
}
