//! Contextual n-gram signal
//!
//! Word bigrams and trigrams from the label are compared against the
//! distributions seen in previously user-verified fixed vs variable
//! transactions. The signal only activates once the knowledge cache has
//! accumulated verified history; with no n-gram overlap it stays at 0 and
//! the ensemble runs on the other four signals.
//!
//! Both corpus building and scoring operate on normalized merchant keys, not
//! raw labels: the noise tokens stripped by the normalizer (dates, reference
//! numbers, payment markers) would otherwise dominate the distributions, and
//! using the same form on both sides keeps every comparison aligned.

use std::collections::HashMap;

use crate::models::ExpenseNature;
use crate::signals::clamp_signed;

/// Per-classification occurrence counts for one n-gram
#[derive(Debug, Clone, Copy, Default)]
struct GramCounts {
    fixed: u64,
    variable: u64,
}

/// N-gram distributions built from the verified corpus
#[derive(Debug, Default)]
pub struct NgramModel {
    counts: HashMap<String, GramCounts>,
    labels_seen: usize,
}

impl NgramModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a model from `(normalized_label, verified_classification)` pairs
    pub fn from_corpus<'a, I>(corpus: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, ExpenseNature)>,
    {
        let mut model = Self::new();
        for (label, nature) in corpus {
            model.observe(label, nature);
        }
        model
    }

    /// Fold one verified label into the distributions
    pub fn observe(&mut self, normalized_label: &str, nature: ExpenseNature) {
        for gram in extract_ngrams(normalized_label) {
            let entry = self.counts.entry(gram).or_default();
            match nature {
                // Provisions are recurring by construction; they count on
                // the fixed side of the distribution
                ExpenseNature::Fixed | ExpenseNature::Provision => entry.fixed += 1,
                ExpenseNature::Variable => entry.variable += 1,
            }
        }
        self.labels_seen += 1;
    }

    /// Number of verified labels folded into the model
    pub fn corpus_size(&self) -> usize {
        self.labels_seen
    }

    /// Score in [-1, 1]; positive = fixed-leaning, 0 with no overlap.
    ///
    /// Each overlapping n-gram contributes its relative-frequency ratio
    /// `(fixed - variable) / (fixed + variable)`; the score is the mean over
    /// overlapping grams.
    pub fn score(&self, normalized_label: &str) -> f64 {
        if self.counts.is_empty() {
            return 0.0;
        }

        let mut total = 0.0;
        let mut matched = 0usize;
        for gram in extract_ngrams(normalized_label) {
            let Some(counts) = self.counts.get(&gram) else {
                continue;
            };
            let seen = (counts.fixed + counts.variable) as f64;
            if seen == 0.0 {
                continue;
            }
            total += (counts.fixed as f64 - counts.variable as f64) / seen;
            matched += 1;
        }

        if matched == 0 {
            return 0.0;
        }
        clamp_signed(total / matched as f64)
    }
}

/// Bigrams and trigrams over the label's word tokens; a single-token label
/// contributes the token itself so short merchant keys still participate
fn extract_ngrams(label: &str) -> Vec<String> {
    let tokens: Vec<&str> = label.split_whitespace().collect();
    if tokens.is_empty() {
        return Vec::new();
    }
    if tokens.len() == 1 {
        return vec![tokens[0].to_string()];
    }

    let mut grams = Vec::new();
    for window in tokens.windows(2) {
        grams.push(window.join(" "));
    }
    for window in tokens.windows(3) {
        grams.push(window.join(" "));
    }
    grams
}
