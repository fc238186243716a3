//! Integration tests for centime-core
//!
//! These tests exercise the full normalize → signal → ensemble → learn
//! workflow, plus pattern detection over realistic import batches.

use centime_core::{
    ClassifierConfig, Classifier, ConfidenceBand, ConversionKind, ExpenseNature, MemoryStore,
    PatternAction, SignalKind, SqliteStore, Storage, Transaction,
};
use chrono::NaiveDate;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid test date")
}

fn tx(id: i64, date: &str, label: &str, amount: f64) -> Transaction {
    Transaction {
        id,
        account_id: 1,
        date: d(date),
        raw_label: label.to_string(),
        amount,
    }
}

/// Three monthly Netflix charges with identical amounts, raw-label noise
/// included
fn netflix_batch() -> Vec<Transaction> {
    vec![
        tx(1, "2026-01-05", "CB NETFLIX.COM 05/01 REF 884210", -9.99),
        tx(2, "2026-02-04", "CB NETFLIX.COM 04/02 REF 991042", -9.99),
        tx(3, "2026-03-06", "CB NETFLIX.COM 06/03 REF 120584", -9.99),
    ]
}

/// Irregular restaurant spending: wandering amounts, erratic spacing
fn restaurant_batch() -> Vec<Transaction> {
    vec![
        tx(10, "2026-01-03", "PAIEMENT CB RESTAURANT LE BISTROT", -34.50),
        tx(11, "2026-01-06", "PAIEMENT CB RESTAURANT LE BISTROT", -18.20),
        tx(12, "2026-01-25", "PAIEMENT CB RESTAURANT LE BISTROT", -61.00),
    ]
}

// =============================================================================
// Classification scenarios
// =============================================================================

#[test]
fn test_netflix_with_history_is_fixed_high_confidence() {
    let store = MemoryStore::new();
    for t in netflix_batch() {
        store.push_occurrence("NETFLIX COM", t.date, t.amount);
    }
    let classifier = Classifier::new(&store, ClassifierConfig::default()).unwrap();

    let result = classifier
        .classify(&tx(4, "2026-04-05", "CB NETFLIX.COM 05/04 REF 31077", -9.99))
        .unwrap();

    assert_eq!(result.merchant_key, "NETFLIX COM");
    assert_eq!(result.decision, ExpenseNature::Fixed);
    assert_eq!(result.confidence_band, ConfidenceBand::High);
    assert!(!result.from_cache);
    // Stable amounts and monthly spacing both reinforce the fixed lean
    let stability = result
        .contributing_factors
        .iter()
        .find(|f| f.signal == SignalKind::Stability)
        .unwrap();
    assert!(stability.contribution > 0.19);
    let frequency = result
        .contributing_factors
        .iter()
        .find(|f| f.signal == SignalKind::Frequency)
        .unwrap();
    assert!(frequency.contribution > 0.09);
}

#[test]
fn test_restaurant_is_variable_despite_repetition() {
    let store = MemoryStore::new();
    let classifier = Classifier::new(&store, ClassifierConfig::default()).unwrap();

    let result = classifier
        .classify(&tx(10, "2026-01-03", "PAIEMENT CB RESTAURANT LE BISTROT", -34.50))
        .unwrap();

    assert_eq!(result.decision, ExpenseNature::Variable);
    assert!(result.final_score < 0.0);
    // Unsigned signals are gated out when the signed lean is variable
    for factor in &result.contributing_factors {
        if matches!(factor.signal, SignalKind::Stability | SignalKind::Frequency) {
            assert_eq!(factor.contribution, 0.0);
        }
    }
}

#[test]
fn test_first_ever_utility_bill_is_fixed_without_history() {
    let store = MemoryStore::new();
    let classifier = Classifier::new(&store, ClassifierConfig::default()).unwrap();

    let result = classifier
        .classify(&tx(1, "2026-01-12", "PRLV SEPA EDF FACTURE 20240112", -54.30))
        .unwrap();

    assert_eq!(result.merchant_key, "EDF FACTURE");
    assert_eq!(result.decision, ExpenseNature::Fixed);
    assert!(!result.contributing_factors.is_empty());
}

#[test]
fn test_classification_is_deterministic() {
    let t = tx(1, "2026-01-05", "CB NETFLIX.COM 05/01 REF 884210", -9.99);

    // Two independent classifiers over identical state must agree exactly
    let store_a = MemoryStore::new();
    let store_b = MemoryStore::new();
    let a = Classifier::new(&store_a, ClassifierConfig::default()).unwrap();
    let b = Classifier::new(&store_b, ClassifierConfig::default()).unwrap();

    let ra = a.classify(&t).unwrap();
    let rb = b.classify(&t).unwrap();
    assert_eq!(ra.final_score, rb.final_score);
    assert_eq!(ra.decision, rb.decision);
    assert_eq!(ra.contributing_factors.len(), rb.contributing_factors.len());
    for (fa, fb) in ra.contributing_factors.iter().zip(&rb.contributing_factors) {
        assert_eq!(fa.signal, fb.signal);
        assert_eq!(fa.contribution, fb.contribution);
    }
}

// =============================================================================
// Batch classification
// =============================================================================

#[test]
fn test_batch_continues_past_a_bad_transaction() {
    let store = MemoryStore::new();
    let classifier = Classifier::new(&store, ClassifierConfig::default()).unwrap();

    let mut batch = netflix_batch();
    batch.push(tx(99, "2026-02-01", "PENDING AUTHORIZATION", 0.0));
    batch.extend(restaurant_batch());

    let outcomes = classifier.classify_batch(&batch);
    assert_eq!(outcomes.len(), 7);

    let failed: Vec<_> = outcomes.iter().filter(|o| o.result().is_none()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].transaction_id(), 99);

    // Every other transaction still got a full decision
    for outcome in outcomes.iter().filter(|o| o.result().is_some()) {
        assert!(!outcome.result().unwrap().contributing_factors.is_empty());
    }
}

// =============================================================================
// Recurring pattern detection
// =============================================================================

#[test]
fn test_monthly_subscription_auto_converts() {
    let store = MemoryStore::new();
    let classifier = Classifier::new(&store, ClassifierConfig::default()).unwrap();

    let groups = classifier.group_by_merchant(&netflix_batch());
    let patterns = classifier.detect_patterns(&groups);

    assert_eq!(patterns.len(), 1);
    let p = &patterns[0];
    assert_eq!(p.merchant_key, "NETFLIX COM");
    assert_eq!(p.occurrence_count, 3);
    assert_eq!(p.occurrences, vec![1, 2, 3]);
    assert!(p.pattern_score >= 80.0, "score was {}", p.pattern_score);
    assert_eq!(p.suggested_action, PatternAction::AutoConvert);
    assert_eq!(p.conversion, ConversionKind::FixedExpense);
    assert!((p.interval_days_mean - 30.0).abs() < 0.01);
}

#[test]
fn test_irregular_spending_is_ignored_by_the_detector() {
    let store = MemoryStore::new();
    let classifier = Classifier::new(&store, ClassifierConfig::default()).unwrap();

    let groups = classifier.group_by_merchant(&restaurant_batch());
    let patterns = classifier.detect_patterns(&groups);

    assert_eq!(patterns.len(), 1);
    assert!(patterns[0].pattern_score < 50.0);
    assert_eq!(patterns[0].suggested_action, PatternAction::Ignore);
}

#[test]
fn test_monthly_savings_transfer_becomes_a_provision() {
    let store = MemoryStore::new();
    let classifier = Classifier::new(&store, ClassifierConfig::default()).unwrap();

    let batch = vec![
        tx(20, "2026-01-02", "VIR SEPA LIVRET A", -200.0),
        tx(21, "2026-02-02", "VIR SEPA LIVRET A", -200.0),
        tx(22, "2026-03-02", "VIR SEPA LIVRET A", -200.0),
    ];
    let groups = classifier.group_by_merchant(&batch);
    let patterns = classifier.detect_patterns(&groups);

    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].conversion, ConversionKind::SavingsProvision);
    assert_eq!(patterns[0].suggested_action, PatternAction::AutoConvert);
}

#[test]
fn test_pattern_detection_is_idempotent_over_a_batch() {
    let store = MemoryStore::new();
    let classifier = Classifier::new(&store, ClassifierConfig::default()).unwrap();

    let groups = classifier.group_by_merchant(&netflix_batch());
    let first = classifier.detect_patterns(&groups);
    let second = classifier.detect_patterns(&groups);

    assert_eq!(first.len(), second.len());
    assert_eq!(first[0].pattern_score, second[0].pattern_score);
    assert_eq!(first[0].occurrences, second[0].occurrences);
}

// =============================================================================
// Knowledge cache and learning loop
// =============================================================================

#[test]
fn test_repeated_high_confidence_decisions_reach_the_fast_path() {
    let store = MemoryStore::new();
    let classifier = Classifier::new(&store, ClassifierConfig::default()).unwrap();
    let t = tx(1, "2026-01-05", "CB NETFLIX.COM", -9.99);

    // Three high-confidence classifications walk usage up to the gate
    for _ in 0..3 {
        let result = classifier.classify(&t).unwrap();
        assert!(!result.from_cache);
    }
    let cached = classifier.classify(&t).unwrap();
    assert!(cached.from_cache);
    assert_eq!(cached.decision, ExpenseNature::Fixed);
    assert_eq!(cached.contributing_factors.len(), 1);
    assert_eq!(
        cached.contributing_factors[0].signal,
        SignalKind::KnowledgeCache
    );
    assert_eq!(classifier.stats().cache_hits, 1);
}

#[test]
fn test_user_override_beats_the_ensemble_immediately() {
    let store = MemoryStore::new();
    let classifier = Classifier::new(&store, ClassifierConfig::default()).unwrap();
    let t = tx(1, "2026-01-05", "CB NETFLIX.COM", -9.99);

    // Shared account, usage tracked elsewhere; the user calls it variable
    classifier
        .apply_override("NETFLIX COM", ExpenseNature::Variable)
        .unwrap();

    let result = classifier.classify(&t).unwrap();
    assert!(result.from_cache);
    assert_eq!(result.decision, ExpenseNature::Variable);
    assert!(result.final_score < 0.0);
}

#[test]
fn test_acceptances_raise_cached_confidence() {
    let store = MemoryStore::new();
    let classifier = Classifier::new(&store, ClassifierConfig::default()).unwrap();

    classifier
        .record_acceptance("SPOTIFY", ExpenseNature::Fixed)
        .unwrap();
    let seeded = store.get_knowledge_entry("SPOTIFY").unwrap().unwrap();

    classifier
        .record_acceptance("SPOTIFY", ExpenseNature::Fixed)
        .unwrap();
    let bumped = store.get_knowledge_entry("SPOTIFY").unwrap().unwrap();

    assert!(bumped.confidence > seeded.confidence);
    assert_eq!(bumped.usage_count, seeded.usage_count + 1);
}

// =============================================================================
// N-gram signal over a verified corpus
// =============================================================================

#[test]
fn test_verified_corpus_activates_the_ngram_signal() {
    // A merchant unknown to every vocabulary, verified fixed by the user
    let store = MemoryStore::new();
    store.push_verified_label("PRLV MAISON BLEUE CANTINE SCOLAIRE", ExpenseNature::Fixed);
    store.push_verified_label("PRLV MAISON BLEUE CANTINE PERISCOLAIRE", ExpenseNature::Fixed);
    let classifier = Classifier::new(&store, ClassifierConfig::default()).unwrap();

    let result = classifier
        .classify(&tx(1, "2026-01-05", "PRLV MAISON BLEUE CANTINE", -45.00))
        .unwrap();
    let ngram = result
        .contributing_factors
        .iter()
        .find(|f| f.signal == SignalKind::Ngram)
        .unwrap();
    assert!(ngram.contribution > 0.0);

    // A bare classifier with no corpus sees nothing
    let empty = MemoryStore::new();
    let bare = Classifier::new(&empty, ClassifierConfig::default()).unwrap();
    let result = bare
        .classify(&tx(1, "2026-01-05", "PRLV MAISON BLEUE CANTINE", -45.00))
        .unwrap();
    let ngram = result
        .contributing_factors
        .iter()
        .find(|f| f.signal == SignalKind::Ngram)
        .unwrap();
    assert_eq!(ngram.contribution, 0.0);
}

#[test]
fn test_refresh_picks_up_newly_verified_labels() {
    let store = MemoryStore::new();
    let classifier = Classifier::new(&store, ClassifierConfig::default()).unwrap();
    assert_eq!(classifier.refresh_ngram_model().unwrap(), 0);

    store.push_verified_label("PRLV MAISON BLEUE CANTINE SCOLAIRE", ExpenseNature::Fixed);
    assert_eq!(classifier.refresh_ngram_model().unwrap(), 1);
}

// =============================================================================
// SQLite-backed end-to-end
// =============================================================================

#[test]
fn test_full_workflow_over_sqlite() {
    let store = SqliteStore::in_memory().unwrap();
    for t in netflix_batch() {
        store.record_occurrence("NETFLIX COM", t.date, t.amount).unwrap();
    }
    let classifier = Classifier::new(&store, ClassifierConfig::default()).unwrap();

    let result = classifier
        .classify(&tx(4, "2026-04-05", "CB NETFLIX.COM 05/04", -9.99))
        .unwrap();
    assert_eq!(result.decision, ExpenseNature::Fixed);
    assert_eq!(result.confidence_band, ConfidenceBand::High);

    classifier
        .apply_override("NETFLIX COM", ExpenseNature::Provision)
        .unwrap();
    let overridden = classifier
        .classify(&tx(5, "2026-05-05", "CB NETFLIX.COM 05/05", -9.99))
        .unwrap();
    assert!(overridden.from_cache);
    assert_eq!(overridden.decision, ExpenseNature::Provision);

    let stats = classifier.stats();
    assert_eq!(stats.total_classified, 2);
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.failed, 0);
}
