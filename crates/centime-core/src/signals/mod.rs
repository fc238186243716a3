//! Signal extractors
//!
//! Five independent extractors feed the ensemble scorer:
//! - `keyword` - weighted fixed/variable vocabulary matches
//! - `merchant` - curated merchant-category regex patterns
//! - `stability` - amount stability across occurrences of a merchant key
//! - `frequency` - regularity of time spacing between occurrences
//! - `ngram` - contextual word sequences scored against verified history
//!
//! Each extractor is a pure function of its inputs; none touches storage.

pub mod frequency;
pub mod keyword;
pub mod merchant;
pub mod ngram;
pub mod stability;

/// Whole-word containment check that also handles multi-word terms
///
/// Both sides must already be uppercase with single-space token separation
/// (the normalizer's output shape).
pub(crate) fn contains_term(haystack: &str, term: &str) -> bool {
    // Padding both sides turns whole-word containment into plain substring
    // search, including for multi-word terms
    format!(" {} ", haystack).contains(&format!(" {} ", term))
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
pub(crate) fn stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

pub(crate) fn clamp_signed(score: f64) -> f64 {
    score.clamp(-1.0, 1.0)
}
