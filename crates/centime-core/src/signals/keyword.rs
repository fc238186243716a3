//! Keyword signal
//!
//! Two weighted vocabularies, one fixed-leaning (subscriptions, utilities,
//! insurance, rent) and one variable-leaning (restaurants, groceries, fuel).
//! The score is the best fixed match minus the best variable match, so a
//! label hitting both vocabularies lands wherever the stronger evidence
//! points.

use crate::config::ClassifierConfig;
use crate::signals::{clamp_signed, contains_term};

/// Score in [-1, 1]; positive = fixed-leaning. No match on either side is 0.
pub fn keyword_score(config: &ClassifierConfig, merchant_key: &str) -> f64 {
    let best_fixed = best_match(config, merchant_key, true);
    let best_variable = best_match(config, merchant_key, false);
    clamp_signed(best_fixed - best_variable)
}

/// Best-weight match from one vocabulary, 0.0 when nothing matches
fn best_match(config: &ClassifierConfig, merchant_key: &str, fixed: bool) -> f64 {
    let terms = if fixed {
        &config.fixed_terms
    } else {
        &config.variable_terms
    };
    terms
        .iter()
        .filter(|t| contains_term(merchant_key, t.term))
        .map(|t| t.weight)
        .fold(0.0, f64::max)
}

/// Whether the label matches the fixed vocabulary at all; used by the
/// pattern detector's keyword bonus
pub fn matches_fixed_vocabulary(config: &ClassifierConfig, merchant_key: &str) -> bool {
    config
        .fixed_terms
        .iter()
        .any(|t| contains_term(merchant_key, t.term))
}

/// Whether the label matches the savings vocabulary; flips a pattern's
/// conversion to a provision entry
pub fn matches_provision_vocabulary(config: &ClassifierConfig, merchant_key: &str) -> bool {
    config
        .provision_terms
        .iter()
        .any(|t| contains_term(merchant_key, t.term))
}
