use std::collections::HashSet;

use super::text::{normalize_text, word_set};
use crate::config::DEFAULT_SIMILARITY_THRESHOLD;
use crate::question::ParsedQuestion;

/// Normalized stem and first two options, `|`-joined.
pub fn fingerprint(question: &ParsedQuestion) -> String {
    let option = |idx: usize| {
        question
            .options
            .get(idx)
            .map(|o| normalize_text(&o.text))
            .unwrap_or_default()
    };
    format!("{}|{}|{}", normalize_text(&question.text), option(0), option(1))
}

/// |a ∩ b| / |a ∪ b|; two empty sets are identical.
pub fn jaccard_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

#[derive(Debug, Clone, PartialEq)]
pub struct DedupOutcome {
    pub unique: Vec<ParsedQuestion>,
    pub duplicates_removed: usize,
}

/// Drops exact (fingerprint) and near (stem Jaccard) duplicates, keeping first occurrences.
///
/// Every candidate is compared against every accepted stem, so cost grows with
/// the square of the input. Callers cap the input first.
#[derive(Debug, Clone, Copy)]
pub struct Deduplicator {
    threshold: f64,
}

impl Deduplicator {
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Whether `words` is a near-duplicate of any of `accepted`.
    pub fn is_near_duplicate<'a>(
        &self,
        words: &HashSet<String>,
        accepted: impl IntoIterator<Item = &'a HashSet<String>>,
    ) -> bool {
        accepted
            .into_iter()
            .any(|other| jaccard_similarity(words, other) > self.threshold)
    }

    pub fn dedup(&self, questions: Vec<ParsedQuestion>) -> DedupOutcome {
        let mut seen: HashSet<String> = HashSet::new();
        let mut accepted_words: Vec<HashSet<String>> = Vec::new();
        let mut unique = Vec::with_capacity(questions.len());
        let mut duplicates_removed = 0;

        for question in questions {
            let key = fingerprint(&question);
            if seen.contains(&key) {
                duplicates_removed += 1;
                continue;
            }

            let words = word_set(&question.text);
            if self.is_near_duplicate(&words, &accepted_words) {
                tracing::trace!("Near-duplicate stem dropped: {}", question.text);
                duplicates_removed += 1;
                continue;
            }

            seen.insert(key);
            accepted_words.push(words);
            unique.push(question);
        }

        DedupOutcome {
            unique,
            duplicates_removed,
        }
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}
