//! Frequency/regularity signal
//!
//! Scores how regular the time spacing between occurrences of a merchant key
//! is. The mode of the inter-occurrence intervals is matched against the
//! canonical recurrence periods (weekly, biweekly, monthly, quarterly,
//! yearly, each with a tolerance band); the monthly 28-31 day band scores
//! highest. The band score is damped by the share of intervals that agree
//! with the mode, so a merchant visited often but erratically lands near 0.

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::config::{CanonicalPeriod, ClassifierConfig};

/// Score in [0, 1]; 0.0 with fewer than 2 dated occurrences.
pub fn frequency_score(config: &ClassifierConfig, dates: &[NaiveDate]) -> f64 {
    let intervals = day_intervals(dates);
    if intervals.is_empty() {
        return 0.0;
    }

    let mode = mode_interval(&intervals);
    let Some(period) = match_period(&config.canonical_periods, mode) else {
        return 0.0;
    };

    period.score * mode_agreement(&intervals, mode, period.tolerance)
}

/// Regularity points for the 0-100 pattern score, plus whether the group's
/// spacing is consistent enough to count as regular at all
pub(crate) fn regularity_points(config: &ClassifierConfig, dates: &[NaiveDate]) -> f64 {
    let intervals = day_intervals(dates);
    if intervals.is_empty() {
        return 0.0;
    }

    let mode = mode_interval(&intervals);
    let Some(period) = match_period(&config.canonical_periods, mode) else {
        return 0.0;
    };

    if mode_agreement(&intervals, mode, period.tolerance) < config.regularity_consistency_threshold
    {
        return 0.0;
    }
    period.pattern_points
}

/// Inter-occurrence intervals in days over date-sorted input
pub(crate) fn day_intervals(dates: &[NaiveDate]) -> Vec<i64> {
    let mut sorted = dates.to_vec();
    sorted.sort_unstable();
    sorted
        .windows(2)
        .map(|w| (w[1] - w[0]).num_days())
        .collect()
}

/// Most common interval; ties break toward the smaller interval so the
/// result is deterministic
fn mode_interval(intervals: &[i64]) -> i64 {
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for interval in intervals {
        *counts.entry(*interval).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|(a_days, a_count), (b_days, b_count)| {
            a_count.cmp(b_count).then(b_days.cmp(a_days))
        })
        .map(|(days, _)| days)
        .unwrap_or(0)
}

fn match_period(periods: &[CanonicalPeriod], mode: i64) -> Option<&CanonicalPeriod> {
    periods
        .iter()
        .find(|p| (mode - p.days).abs() <= p.tolerance)
}

/// Share of intervals within tolerance of the mode
fn mode_agreement(intervals: &[i64], mode: i64, tolerance: i64) -> f64 {
    let agreeing = intervals
        .iter()
        .filter(|&&i| (i - mode).abs() <= tolerance)
        .count();
    agreeing as f64 / intervals.len() as f64
}
