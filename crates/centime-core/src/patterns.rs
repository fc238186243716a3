//! Recurring pattern detection
//!
//! Groups transactions by normalized merchant key and scores each group
//! 0-100 on how confidently it represents a genuine recurring expense. The
//! score combines occurrence count, amount stability, spacing regularity,
//! and a vocabulary bonus; threshold bands turn it into an action:
//!
//! `>= 80` auto-convert, `70-79` suggest, `50-69` ask the user to validate,
//! `< 50` ignore and re-evaluate on the next batch.
//!
//! Evaluation is idempotent over a batch and never mutates a prior
//! evaluation; each run emits fresh [`RecurringPattern`] values the caller
//! can diff against stored ones.

use chrono::Utc;
use tracing::debug;

use crate::config::ClassifierConfig;
use crate::models::{ConversionKind, PatternAction, RecurringPattern, Transaction};
use crate::normalize::LabelNormalizer;
use crate::signals::frequency::{day_intervals, regularity_points};
use crate::signals::keyword::{matches_fixed_vocabulary, matches_provision_vocabulary};
use crate::signals::stability::coefficient_of_variation;
use crate::signals::{mean, stddev};

/// Group a batch by normalized merchant key, preserving date order within
/// each group
///
/// Grouping must complete before detection runs: the detector needs the full
/// group, not a partial view. Output is sorted by key for determinism.
pub fn group_by_merchant(
    normalizer: &LabelNormalizer,
    transactions: &[Transaction],
) -> Vec<(String, Vec<Transaction>)> {
    let mut groups: std::collections::BTreeMap<String, Vec<Transaction>> =
        std::collections::BTreeMap::new();
    for tx in transactions {
        let key = normalizer.normalize(&tx.raw_label).key;
        groups.entry(key).or_default().push(tx.clone());
    }
    for group in groups.values_mut() {
        group.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
    }
    groups.into_iter().collect()
}

/// Evaluate every merchant group with at least 2 occurrences
///
/// Results are sorted by pattern score descending (then key) so the caller
/// can surface the strongest suggestions first.
pub fn detect_patterns(
    config: &ClassifierConfig,
    groups: &[(String, Vec<Transaction>)],
) -> Vec<RecurringPattern> {
    let mut patterns: Vec<RecurringPattern> = groups
        .iter()
        .filter(|(_, txs)| txs.len() >= 2)
        .map(|(key, txs)| evaluate_group(config, key, txs))
        .collect();

    patterns.sort_by(|a, b| {
        b.pattern_score
            .total_cmp(&a.pattern_score)
            .then_with(|| a.merchant_key.cmp(&b.merchant_key))
    });
    patterns
}

/// Score one merchant group; caller guarantees at least 2 occurrences
fn evaluate_group(
    config: &ClassifierConfig,
    merchant_key: &str,
    transactions: &[Transaction],
) -> RecurringPattern {
    let mut sorted: Vec<&Transaction> = transactions.iter().collect();
    sorted.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));

    let amounts: Vec<f64> = sorted.iter().map(|t| t.amount.abs()).collect();
    let dates: Vec<_> = sorted.iter().map(|t| t.date).collect();
    let intervals: Vec<f64> = day_intervals(&dates).iter().map(|&d| d as f64).collect();

    let occurrence = occurrence_points(config, sorted.len());
    let cv = coefficient_of_variation(&amounts);
    let stability = stability_points(config, cv);
    let regularity = regularity_points(config, &dates);
    let vocabulary_hit = matches_fixed_vocabulary(config, merchant_key)
        || matches_provision_vocabulary(config, merchant_key);
    let bonus = if vocabulary_hit {
        config.pattern_keyword_bonus
    } else {
        0.0
    };

    let pattern_score = (occurrence + stability + regularity + bonus).clamp(0.0, 100.0);
    let suggested_action = action_for(config, pattern_score);
    let conversion = if matches_provision_vocabulary(config, merchant_key) {
        ConversionKind::SavingsProvision
    } else {
        ConversionKind::FixedExpense
    };

    debug!(
        merchant_key,
        occurrences = sorted.len(),
        cv = format!("{:.3}", cv),
        score = format!("{:.1}", pattern_score),
        action = suggested_action.as_str(),
        "evaluated recurring pattern"
    );

    RecurringPattern {
        merchant_key: merchant_key.to_string(),
        occurrences: sorted.iter().map(|t| t.id).collect(),
        occurrence_count: sorted.len(),
        amount_mean: mean(&amounts),
        amount_stddev: stddev(&amounts),
        interval_days_mean: mean(&intervals),
        interval_days_stddev: stddev(&intervals),
        pattern_score,
        suggested_action,
        conversion,
        evaluated_at: Utc::now(),
    }
}

fn occurrence_points(config: &ClassifierConfig, count: usize) -> f64 {
    match count {
        0 | 1 => 0.0,
        2 => config.occurrence_points[0],
        3 => config.occurrence_points[1],
        4 => config.occurrence_points[2],
        _ => config.occurrence_points[3],
    }
}

/// Linear taper: full points at or below the cv floor, none past the ceiling
fn stability_points(config: &ClassifierConfig, cv: f64) -> f64 {
    if cv <= config.pattern_cv_floor {
        config.pattern_stability_points
    } else if cv >= config.pattern_cv_ceiling {
        0.0
    } else {
        let span = config.pattern_cv_ceiling - config.pattern_cv_floor;
        config.pattern_stability_points * (config.pattern_cv_ceiling - cv) / span
    }
}

fn action_for(config: &ClassifierConfig, score: f64) -> PatternAction {
    if score >= config.auto_convert_threshold {
        PatternAction::AutoConvert
    } else if score >= config.suggest_threshold {
        PatternAction::Suggest
    } else if score >= config.validate_threshold {
        PatternAction::Validate
    } else {
        PatternAction::Ignore
    }
}
