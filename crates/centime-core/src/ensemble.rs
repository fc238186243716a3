//! Ensemble scorer and decision
//!
//! Combines the five signal sub-scores with fixed weights into one bounded
//! score, then maps it onto a decision and a confidence band. Stability and
//! frequency are naturally unsigned, so they only push toward "fixed" when
//! the signed signals (keyword, merchant pattern, n-gram) already lean fixed;
//! a perfectly regular restaurant habit never becomes a fixed expense on
//! regularity alone.
//!
//! Every decision carries the full ranked list of weighted contributions, so
//! a classification can always be explained back to the user.

use crate::config::ClassifierConfig;
use crate::models::{
    ConfidenceBand, ContributingFactor, EnsembleResult, ExpenseNature, SignalKind, SignalScores,
};

/// Combine sub-scores into a decision for one merchant key
pub fn score_signals(
    config: &ClassifierConfig,
    merchant_key: &str,
    signals: &SignalScores,
) -> EnsembleResult {
    let w = &config.weights;

    let keyword = w.keyword * signals.keyword;
    let merchant_pattern = w.merchant_pattern * signals.merchant_pattern;
    let ngram = w.ngram * signals.ngram;
    let signed_lean = keyword + merchant_pattern + ngram;

    // Unsigned signals are admitted only once the signed signals agree the
    // merchant leans fixed; they reinforce, never flip
    let (stability, frequency, unsigned_admitted) = if signed_lean > 0.0 {
        (
            w.stability * signals.stability,
            w.frequency * signals.frequency,
            true,
        )
    } else {
        (0.0, 0.0, false)
    };

    let final_score = (signed_lean + stability + frequency).clamp(-1.0, 1.0);

    let decision = if final_score > config.high_confidence_threshold {
        ExpenseNature::Fixed
    } else {
        // Conservative default: ambiguous and variable-leaning scores are
        // both Variable; nothing is auto-classified Fixed without high
        // confidence
        ExpenseNature::Variable
    };

    let confidence_band = band_for(config, final_score);

    let mut contributing_factors = vec![
        ContributingFactor {
            signal: SignalKind::Keyword,
            contribution: keyword,
            reason: signed_reason("vocabulary", signals.keyword),
        },
        ContributingFactor {
            signal: SignalKind::MerchantPattern,
            contribution: merchant_pattern,
            reason: signed_reason("merchant pattern", signals.merchant_pattern),
        },
        ContributingFactor {
            signal: SignalKind::Ngram,
            contribution: ngram,
            reason: signed_reason("verified n-gram history", signals.ngram),
        },
        ContributingFactor {
            signal: SignalKind::Stability,
            contribution: stability,
            reason: unsigned_reason("amount stability", signals.stability, unsigned_admitted),
        },
        ContributingFactor {
            signal: SignalKind::Frequency,
            contribution: frequency,
            reason: unsigned_reason("spacing regularity", signals.frequency, unsigned_admitted),
        },
    ];
    contributing_factors.sort_by(|a, b| {
        b.contribution
            .abs()
            .total_cmp(&a.contribution.abs())
            .then_with(|| a.signal.as_str().cmp(b.signal.as_str()))
    });

    EnsembleResult {
        merchant_key: merchant_key.to_string(),
        final_score,
        decision,
        confidence_band,
        contributing_factors,
        from_cache: false,
    }
}

pub(crate) fn band_for(config: &ClassifierConfig, score: f64) -> ConfidenceBand {
    let magnitude = score.abs();
    if magnitude > config.high_confidence_threshold {
        ConfidenceBand::High
    } else if magnitude > config.medium_confidence_threshold {
        ConfidenceBand::Medium
    } else {
        ConfidenceBand::Low
    }
}

fn signed_reason(source: &str, raw: f64) -> String {
    if raw > 0.0 {
        format!("fixed-leaning {} match ({:+.2})", source, raw)
    } else if raw < 0.0 {
        format!("variable-leaning {} match ({:+.2})", source, raw)
    } else {
        format!("no {} match", source)
    }
}

fn unsigned_reason(source: &str, raw: f64, admitted: bool) -> String {
    if !admitted {
        format!(
            "{} ({:.2}) withheld: signed signals do not lean fixed",
            source, raw
        )
    } else {
        format!("{} {:.2} reinforces fixed lean", source, raw)
    }
}
