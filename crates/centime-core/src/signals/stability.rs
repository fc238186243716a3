//! Amount-stability signal
//!
//! Recurring fixed costs (rent, subscriptions) have near-constant amounts;
//! variable spending fluctuates. The score maps the coefficient of variation
//! of absolute amounts onto [0, 1] with a linear curve: variation at or below
//! 5% is fully stable, at or above 50% fully unstable.

use crate::config::ClassifierConfig;
use crate::signals::{mean, stddev};

/// Neutral score returned with fewer than 2 occurrences: not enough history
/// to judge either way.
pub const NEUTRAL_STABILITY: f64 = 0.5;

/// Score in [0, 1]; higher = more stable absolute amount.
pub fn stability_score(config: &ClassifierConfig, amounts: &[f64]) -> f64 {
    if amounts.len() < 2 {
        return NEUTRAL_STABILITY;
    }

    let absolute: Vec<f64> = amounts.iter().map(|a| a.abs()).collect();
    let m = mean(&absolute);
    if m <= f64::EPSILON {
        return NEUTRAL_STABILITY;
    }

    let cv = stddev(&absolute) / m;
    cv_to_score(cv, config.stability_cv_floor, config.stability_cv_ceiling)
}

/// Linear interpolation from coefficient of variation to a [0, 1] score
pub(crate) fn cv_to_score(cv: f64, floor: f64, ceiling: f64) -> f64 {
    if cv <= floor {
        1.0
    } else if cv >= ceiling {
        0.0
    } else {
        1.0 - (cv - floor) / (ceiling - floor)
    }
}

/// Coefficient of variation of absolute amounts; 0.0 under 2 occurrences
pub(crate) fn coefficient_of_variation(amounts: &[f64]) -> f64 {
    if amounts.len() < 2 {
        return 0.0;
    }
    let absolute: Vec<f64> = amounts.iter().map(|a| a.abs()).collect();
    let m = mean(&absolute);
    if m <= f64::EPSILON {
        return 0.0;
    }
    stddev(&absolute) / m
}
