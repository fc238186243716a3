//! Classification facade
//!
//! `Classifier` wires the normalizer, the five signal extractors, the
//! ensemble, the recurring-pattern detector, and the knowledge cache over a
//! storage collaborator. It is the only surface the surrounding application
//! calls.
//!
//! Execution is batch-oriented and synchronous. Batches for different
//! accounts are independent and may run in parallel via separate classifier
//! instances; within a batch, grouping completes before pattern detection.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::ClassifierConfig;
use crate::ensemble::score_signals;
use crate::error::{Error, Result};
use crate::knowledge::KnowledgeCache;
use crate::models::{
    ClassificationOutcome, ClassifierStats, EnsembleResult, ExpenseNature, RecurringPattern,
    SignalScores, Transaction,
};
use crate::normalize::{LabelNormalizer, NormalizedLabel};
use crate::patterns;
use crate::signals::frequency::frequency_score;
use crate::signals::keyword::keyword_score;
use crate::signals::merchant::MerchantMatcher;
use crate::signals::ngram::NgramModel;
use crate::signals::stability::stability_score;
use crate::store::{Occurrence, Storage};

#[derive(Debug, Default)]
struct StatsInner {
    total_classified: u64,
    failed: u64,
    cache_hits: u64,
    fixed_decisions: u64,
    variable_decisions: u64,
    confidence_sum: f64,
}

/// The expense-nature classification pipeline
pub struct Classifier<'a> {
    store: &'a dyn Storage,
    config: ClassifierConfig,
    normalizer: LabelNormalizer,
    matcher: MerchantMatcher,
    /// Rebuilt on demand from the verified corpus; Mutex keeps `classify`
    /// at `&self` (same idiom as the per-session stats)
    ngram: Mutex<NgramModel>,
    stats: Mutex<StatsInner>,
}

impl<'a> Classifier<'a> {
    /// Build a classifier over a storage collaborator
    ///
    /// Compiles the normalizer rules and merchant patterns once and builds
    /// the n-gram model from whatever verified corpus exists. An unavailable
    /// store only costs the n-gram signal; construction still succeeds.
    pub fn new(store: &'a dyn Storage, config: ClassifierConfig) -> Result<Self> {
        let normalizer = LabelNormalizer::new(&config)?;
        let matcher = MerchantMatcher::new(&config)?;

        let classifier = Self {
            store,
            config,
            normalizer,
            matcher,
            ngram: Mutex::new(NgramModel::new()),
            stats: Mutex::new(StatsInner::default()),
        };

        if let Err(e) = classifier.refresh_ngram_model() {
            warn!(error = %e, "verified corpus unavailable, n-gram signal starts inactive");
        }
        Ok(classifier)
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Rebuild the n-gram distributions from the verified corpus
    ///
    /// Returns the number of verified labels folded in. Meant to be called
    /// periodically (e.g. after imports), not per classification.
    pub fn refresh_ngram_model(&self) -> Result<usize> {
        let corpus = self.store.get_verified_corpus()?;
        let mut model = NgramModel::new();
        for verified in &corpus {
            let key = self.normalizer.normalize(&verified.label).key;
            model.observe(&key, verified.classification);
        }
        let size = model.corpus_size();
        *self.lock_ngram() = model;
        debug!(labels = size, "rebuilt n-gram model from verified corpus");
        Ok(size)
    }

    /// Normalize a raw label into a canonical merchant key
    pub fn normalize(&self, raw_label: &str) -> NormalizedLabel {
        self.normalizer.normalize(raw_label)
    }

    /// Classify a single transaction
    pub fn classify(&self, tx: &Transaction) -> Result<EnsembleResult> {
        let key = self.normalizer.normalize(&tx.raw_label).key;
        let history = self.fetch_history(&key);
        match self.classify_with_history(tx, &key, &history) {
            Ok(result) => Ok(result),
            Err(e) => {
                self.lock_stats().failed += 1;
                Err(e)
            }
        }
    }

    /// Classify a batch, grouping by merchant key so history is fetched once
    /// per key
    ///
    /// A single transaction's failure is isolated into a `Failed` outcome;
    /// the rest of the batch completes and partial results stay valid.
    pub fn classify_batch(&self, transactions: &[Transaction]) -> Vec<ClassificationOutcome> {
        let mut histories: HashMap<String, Vec<Occurrence>> = HashMap::new();
        let keys: Vec<String> = transactions
            .iter()
            .map(|tx| self.normalizer.normalize(&tx.raw_label).key)
            .collect();
        for key in &keys {
            if !histories.contains_key(key) {
                histories.insert(key.clone(), self.fetch_history(key));
            }
        }

        let mut outcomes = Vec::with_capacity(transactions.len());
        for (tx, key) in transactions.iter().zip(&keys) {
            let history = histories.get(key).map(Vec::as_slice).unwrap_or(&[]);
            match self.classify_with_history(tx, key, history) {
                Ok(result) => outcomes.push(ClassificationOutcome::Classified {
                    transaction_id: tx.id,
                    result,
                }),
                Err(e) => {
                    warn!(transaction_id = tx.id, error = %e, "transaction failed to classify, continuing batch");
                    self.lock_stats().failed += 1;
                    outcomes.push(ClassificationOutcome::Failed {
                        transaction_id: tx.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            batch = transactions.len(),
            failed = outcomes.iter().filter(|o| o.result().is_none()).count(),
            "classified batch"
        );
        outcomes
    }

    /// Group a batch by merchant key; must complete before pattern detection
    pub fn group_by_merchant(
        &self,
        transactions: &[Transaction],
    ) -> Vec<(String, Vec<Transaction>)> {
        patterns::group_by_merchant(&self.normalizer, transactions)
    }

    /// Evaluate recurring patterns over pre-grouped transactions
    pub fn detect_patterns(
        &self,
        groups: &[(String, Vec<Transaction>)],
    ) -> Vec<RecurringPattern> {
        patterns::detect_patterns(&self.config, groups)
    }

    /// The user overrode a classification; takes precedence over the
    /// ensemble for this merchant key from now on
    pub fn apply_override(&self, merchant_key: &str, nature: ExpenseNature) -> Result<()> {
        info!(merchant_key, nature = nature.as_str(), "applying user override");
        self.knowledge().apply_override(merchant_key, nature)
    }

    /// The user accepted a suggestion unchanged; nudges cached confidence up
    pub fn record_acceptance(&self, merchant_key: &str, nature: ExpenseNature) -> Result<()> {
        self.knowledge().record_acceptance(merchant_key, nature)
    }

    /// Session counters for the observability surface
    pub fn stats(&self) -> ClassifierStats {
        let inner = self.lock_stats();
        let avg_confidence = if inner.total_classified > 0 {
            inner.confidence_sum / inner.total_classified as f64
        } else {
            0.0
        };
        ClassifierStats {
            total_classified: inner.total_classified,
            failed: inner.failed,
            cache_hits: inner.cache_hits,
            fixed_decisions: inner.fixed_decisions,
            variable_decisions: inner.variable_decisions,
            avg_confidence,
        }
    }

    fn classify_with_history(
        &self,
        tx: &Transaction,
        merchant_key: &str,
        history: &[Occurrence],
    ) -> Result<EnsembleResult> {
        if tx.amount == 0.0 {
            // Filtered upstream by contract; kept as a guard so one bad row
            // cannot poison a batch
            return Err(Error::InvalidData(format!(
                "zero-amount transaction {} cannot be classified",
                tx.id
            )));
        }

        // Fast path: an eligible knowledge entry answers without the ensemble
        if let Some(entry) = self.knowledge().lookup(merchant_key, Utc::now()) {
            debug!(merchant_key, "knowledge cache hit");
            let result = self.knowledge().to_result(&entry);
            self.record_stats(&result, true);
            return Ok(result);
        }

        let amounts: Vec<f64> = history.iter().map(|o| o.amount).collect();
        let dates: Vec<_> = history.iter().map(|o| o.date).collect();

        let signals = SignalScores {
            keyword: keyword_score(&self.config, merchant_key),
            merchant_pattern: self.matcher.score(merchant_key),
            stability: stability_score(&self.config, &amounts),
            frequency: frequency_score(&self.config, &dates),
            ngram: self.lock_ngram().score(merchant_key),
        };
        debug!(
            merchant_key,
            keyword = signals.keyword,
            merchant_pattern = signals.merchant_pattern,
            stability = signals.stability,
            frequency = signals.frequency,
            ngram = signals.ngram,
            "extracted signals"
        );

        let result = score_signals(&self.config, merchant_key, &signals);
        self.record_stats(&result, false);

        // First high-confidence decision seeds the knowledge entry; later
        // agreeing decisions walk it toward fast-path eligibility
        if result.final_score.abs() > self.config.high_confidence_threshold {
            self.knowledge()
                .record_classification(merchant_key, result.decision);
        }

        Ok(result)
    }

    fn fetch_history(&self, merchant_key: &str) -> Vec<Occurrence> {
        match self.store.get_transaction_history(merchant_key) {
            Ok(history) => history,
            Err(e) => {
                // Degrade to the no-history signals rather than failing
                warn!(merchant_key, error = %e, "history unavailable, scoring without it");
                Vec::new()
            }
        }
    }

    fn record_stats(&self, result: &EnsembleResult, from_cache: bool) {
        let mut stats = self.lock_stats();
        stats.total_classified += 1;
        stats.confidence_sum += result.final_score.abs();
        if from_cache {
            stats.cache_hits += 1;
        }
        match result.decision {
            ExpenseNature::Fixed | ExpenseNature::Provision => stats.fixed_decisions += 1,
            ExpenseNature::Variable => stats.variable_decisions += 1,
        }
    }

    fn knowledge(&self) -> KnowledgeCache<'_> {
        KnowledgeCache::new(self.store, &self.config)
    }

    fn lock_stats(&self) -> std::sync::MutexGuard<'_, StatsInner> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_ngram(&self) -> std::sync::MutexGuard<'_, NgramModel> {
        self.ngram.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
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

    #[test]
    fn first_ever_utility_is_fixed_on_vocabulary_alone() {
        let store = MemoryStore::new();
        let classifier = Classifier::new(&store, ClassifierConfig::default()).unwrap();

        let result = classifier
            .classify(&tx(1, "2026-01-12", "PRLV SEPA EDF FACTURE", -54.30))
            .unwrap();
        assert_eq!(result.decision, ExpenseNature::Fixed);
        // No history: stability neutral, frequency inactive
        let stability = result
            .contributing_factors
            .iter()
            .find(|f| f.signal == crate::models::SignalKind::Stability)
            .unwrap();
        assert!((stability.contribution - 0.5 * 0.20).abs() < 1e-9);
    }

    #[test]
    fn zero_amount_transactions_are_rejected() {
        let store = MemoryStore::new();
        let classifier = Classifier::new(&store, ClassifierConfig::default()).unwrap();

        let err = classifier
            .classify(&tx(1, "2026-01-12", "WEIRD ROW", 0.0))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
    }

    #[test]
    fn batch_isolates_individual_failures() {
        let store = MemoryStore::new();
        let classifier = Classifier::new(&store, ClassifierConfig::default()).unwrap();

        let batch = vec![
            tx(1, "2026-01-12", "CB NETFLIX.COM ABONNEMENT", -9.99),
            tx(2, "2026-01-13", "BROKEN ROW", 0.0),
            tx(3, "2026-01-14", "RESTAURANT LE BISTROT", -34.50),
        ];
        let outcomes = classifier.classify_batch(&batch);
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].result().is_some());
        assert!(outcomes[1].result().is_none());
        assert!(outcomes[2].result().is_some());

        let stats = classifier.stats();
        assert_eq!(stats.total_classified, 2);
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn history_errors_degrade_to_neutral_signals() {
        struct FailingStore;
        impl Storage for FailingStore {
            fn get_transaction_history(&self, _: &str) -> Result<Vec<Occurrence>> {
                Err(Error::Store("history backend down".to_string()))
            }
            fn get_knowledge_entry(
                &self,
                _: &str,
            ) -> Result<Option<crate::models::KnowledgeEntry>> {
                Err(Error::Store("knowledge backend down".to_string()))
            }
            fn put_knowledge_entry(&self, _: &crate::models::KnowledgeEntry) -> Result<()> {
                Err(Error::Store("knowledge backend down".to_string()))
            }
            fn get_verified_corpus(&self) -> Result<Vec<crate::store::VerifiedLabel>> {
                Err(Error::Store("corpus backend down".to_string()))
            }
        }

        let store = FailingStore;
        let classifier = Classifier::new(&store, ClassifierConfig::default()).unwrap();
        // The whole storage collaborator is down; classification still works
        let result = classifier
            .classify(&tx(1, "2026-01-12", "CB NETFLIX.COM ABONNEMENT", -9.99))
            .unwrap();
        assert_eq!(result.decision, ExpenseNature::Fixed);
        assert!(!result.from_cache);
        // Overrides are acknowledged even though the write is dropped
        classifier
            .apply_override("NETFLIX COM ABONNEMENT", ExpenseNature::Variable)
            .unwrap();
    }
}
