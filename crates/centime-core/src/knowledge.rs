//! Knowledge cache and learning loop
//!
//! The cache stores one learned classification per merchant key and is
//! consulted before the full ensemble runs (fast path). It improves through
//! two user actions: accepting a suggestion unchanged nudges confidence up;
//! overriding a classification replaces it outright and pins it until a new
//! override or staleness reset. User overrides always win against the
//! ensemble on subsequent lookups.
//!
//! Storage failures never surface to the user: a failed read degrades to the
//! full ensemble, a failed learning write is retried once and then dropped
//! with a warning.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::config::ClassifierConfig;
use crate::ensemble::band_for;
use crate::error::Result;
use crate::models::{
    ContributingFactor, EnsembleResult, ExpenseNature, KnowledgeEntry, SignalKind,
};
use crate::store::Storage;

/// Cache facade over the storage collaborator
pub struct KnowledgeCache<'a> {
    store: &'a dyn Storage,
    config: &'a ClassifierConfig,
}

impl<'a> KnowledgeCache<'a> {
    pub fn new(store: &'a dyn Storage, config: &'a ClassifierConfig) -> Self {
        Self { store, config }
    }

    /// Fast-path lookup: returns the cached entry only when it is eligible
    /// to answer without re-running the ensemble
    ///
    /// Eligibility: user-verified entries always qualify (override
    /// precedence); unverified entries need `usage_count >=
    /// knowledge_min_usage` and must not be stale. A storage failure
    /// degrades to a miss.
    pub fn lookup(&self, merchant_key: &str, now: DateTime<Utc>) -> Option<KnowledgeEntry> {
        let entry = match self.store.get_knowledge_entry(merchant_key) {
            Ok(entry) => entry?,
            Err(e) => {
                warn!(merchant_key, error = %e, "knowledge cache unavailable, falling back to full ensemble");
                return None;
            }
        };

        // Staleness trumps everything, including verified entries: an
        // override left unused for the whole retention window is re-checked
        if self.is_stale(&entry, now) {
            debug!(merchant_key, "knowledge entry is stale, forcing re-evaluation");
            return None;
        }
        if entry.verified_by_user {
            return Some(entry);
        }
        if entry.usage_count < self.config.knowledge_min_usage {
            return None;
        }
        Some(entry)
    }

    /// Unused entries past the retention window are stale and excluded from
    /// the fast path; they are never hard-deleted
    pub fn is_stale(&self, entry: &KnowledgeEntry, now: DateTime<Utc>) -> bool {
        entry.usage_count == 0
            && now - entry.last_updated > Duration::days(self.config.knowledge_retention_days)
    }

    /// Synthesize a classification result from a cached entry
    pub fn to_result(&self, entry: &KnowledgeEntry) -> EnsembleResult {
        let final_score = match entry.learned_classification {
            ExpenseNature::Fixed | ExpenseNature::Provision => entry.confidence,
            ExpenseNature::Variable => -entry.confidence,
        };
        let reason = if entry.verified_by_user {
            format!(
                "user-verified classification ({} uses)",
                entry.usage_count
            )
        } else {
            format!("learned classification ({} uses)", entry.usage_count)
        };

        EnsembleResult {
            merchant_key: entry.merchant_key.clone(),
            final_score,
            decision: entry.learned_classification,
            confidence_band: band_for(self.config, final_score),
            contributing_factors: vec![ContributingFactor {
                signal: SignalKind::KnowledgeCache,
                contribution: final_score,
                reason,
            }],
            from_cache: true,
        }
    }

    /// Seed or reinforce an entry after a high-confidence ensemble decision
    ///
    /// First high-confidence classification creates the entry; later
    /// agreeing classifications bump usage toward fast-path eligibility.
    /// A disagreeing classification leaves the entry alone: only the user
    /// may change a learned classification.
    pub fn record_classification(&self, merchant_key: &str, decision: ExpenseNature) {
        let now = Utc::now();
        let entry = match self.store.get_knowledge_entry(merchant_key) {
            Ok(Some(mut existing)) => {
                if existing.learned_classification != decision {
                    debug!(
                        merchant_key,
                        learned = existing.learned_classification.as_str(),
                        decided = decision.as_str(),
                        "ensemble disagrees with learned classification, not updating"
                    );
                    return;
                }
                existing.usage_count += 1;
                existing.last_updated = now;
                existing
            }
            Ok(None) => KnowledgeEntry {
                merchant_key: merchant_key.to_string(),
                learned_classification: decision,
                confidence: self.config.knowledge_seed_confidence,
                usage_count: 1,
                verified_by_user: false,
                last_updated: now,
            },
            Err(e) => {
                warn!(merchant_key, error = %e, "knowledge cache unavailable, skipping seed write");
                return;
            }
        };
        self.put_with_retry(entry);
    }

    /// Learning path: the user accepted a suggestion unchanged
    pub fn record_acceptance(&self, merchant_key: &str, nature: ExpenseNature) -> Result<()> {
        let now = Utc::now();
        let entry = match self.store.get_knowledge_entry(merchant_key) {
            Ok(Some(mut existing)) => {
                existing.usage_count += 1;
                existing.confidence = (existing.confidence + self.config.knowledge_accept_bump)
                    .min(self.config.knowledge_confidence_cap);
                existing.last_updated = now;
                existing
            }
            Ok(None) => KnowledgeEntry {
                merchant_key: merchant_key.to_string(),
                learned_classification: nature,
                confidence: self.config.knowledge_seed_confidence,
                usage_count: 1,
                verified_by_user: false,
                last_updated: now,
            },
            Err(e) => {
                warn!(merchant_key, error = %e, "knowledge cache unavailable, dropping acceptance");
                return Ok(());
            }
        };
        self.put_with_retry(entry);
        Ok(())
    }

    /// Learning path: the user overrode a classification
    ///
    /// The override takes precedence over the ensemble on every subsequent
    /// lookup for this merchant key. The acknowledgment never blocks on a
    /// storage failure.
    pub fn apply_override(&self, merchant_key: &str, nature: ExpenseNature) -> Result<()> {
        let now = Utc::now();
        let usage_count = match self.store.get_knowledge_entry(merchant_key) {
            Ok(Some(existing)) => existing.usage_count,
            Ok(None) => 0,
            Err(e) => {
                warn!(merchant_key, error = %e, "knowledge cache read failed during override");
                0
            }
        };

        self.put_with_retry(KnowledgeEntry {
            merchant_key: merchant_key.to_string(),
            learned_classification: nature,
            confidence: self.config.knowledge_override_confidence,
            usage_count,
            verified_by_user: true,
            last_updated: now,
        });
        Ok(())
    }

    /// Write with one retry; a second failure drops the update with a
    /// warning rather than failing the user-facing call
    fn put_with_retry(&self, entry: KnowledgeEntry) {
        let merchant_key = entry.merchant_key.clone();
        if let Err(first) = self.store.put_knowledge_entry(&entry) {
            warn!(merchant_key, error = %first, "knowledge write failed, retrying once");
            if let Err(second) = self.store.put_knowledge_entry(&entry) {
                warn!(merchant_key, error = %second, "knowledge write failed twice, dropping update");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn config() -> ClassifierConfig {
        ClassifierConfig::default()
    }

    #[test]
    fn lookup_requires_three_uses_unless_verified() {
        let store = MemoryStore::new();
        let config = config();
        let cache = KnowledgeCache::new(&store, &config);
        let now = Utc::now();

        cache.record_classification("NETFLIX COM", ExpenseNature::Fixed);
        assert!(cache.lookup("NETFLIX COM", now).is_none());

        cache.record_classification("NETFLIX COM", ExpenseNature::Fixed);
        cache.record_classification("NETFLIX COM", ExpenseNature::Fixed);
        let entry = cache.lookup("NETFLIX COM", now).unwrap();
        assert_eq!(entry.usage_count, 3);
        assert_eq!(entry.learned_classification, ExpenseNature::Fixed);
    }

    #[test]
    fn override_is_eligible_immediately() {
        let store = MemoryStore::new();
        let config = config();
        let cache = KnowledgeCache::new(&store, &config);

        cache
            .apply_override("CANTINE DU COIN", ExpenseNature::Fixed)
            .unwrap();
        let entry = cache.lookup("CANTINE DU COIN", Utc::now()).unwrap();
        assert!(entry.verified_by_user);
        assert_eq!(entry.learned_classification, ExpenseNature::Fixed);
        assert_eq!(entry.confidence, 0.95);
    }

    #[test]
    fn acceptance_bumps_confidence_up_to_the_cap() {
        let store = MemoryStore::new();
        let config = config();
        let cache = KnowledgeCache::new(&store, &config);

        cache
            .record_acceptance("SPOTIFY", ExpenseNature::Fixed)
            .unwrap();
        for _ in 0..10 {
            cache
                .record_acceptance("SPOTIFY", ExpenseNature::Fixed)
                .unwrap();
        }
        let entry = store.get_knowledge_entry("SPOTIFY").unwrap().unwrap();
        assert!(entry.confidence <= 0.99);
        assert!((entry.confidence - 0.99).abs() < 1e-9);
        assert_eq!(entry.usage_count, 11);
    }

    #[test]
    fn ensemble_disagreement_never_changes_a_learned_classification() {
        let store = MemoryStore::new();
        let config = config();
        let cache = KnowledgeCache::new(&store, &config);

        cache.apply_override("AMAZON", ExpenseNature::Variable).unwrap();
        cache.record_classification("AMAZON", ExpenseNature::Fixed);
        let entry = store.get_knowledge_entry("AMAZON").unwrap().unwrap();
        assert_eq!(entry.learned_classification, ExpenseNature::Variable);
    }

    #[test]
    fn unused_entries_go_stale_after_the_retention_window() {
        let store = MemoryStore::new();
        let config = config();
        let cache = KnowledgeCache::new(&store, &config);

        let old = Utc::now() - Duration::days(200);
        store
            .put_knowledge_entry(&KnowledgeEntry {
                merchant_key: "DORMANT SHOP".to_string(),
                learned_classification: ExpenseNature::Fixed,
                confidence: 0.9,
                usage_count: 0,
                verified_by_user: false,
                last_updated: old,
            })
            .unwrap();

        assert!(cache.lookup("DORMANT SHOP", Utc::now()).is_none());
    }

    #[test]
    fn cached_result_carries_a_single_explaining_factor() {
        let store = MemoryStore::new();
        let config = config();
        let cache = KnowledgeCache::new(&store, &config);

        let entry = KnowledgeEntry {
            merchant_key: "EDF FACTURE".to_string(),
            learned_classification: ExpenseNature::Fixed,
            confidence: 0.95,
            usage_count: 5,
            verified_by_user: true,
            last_updated: Utc::now(),
        };
        let result = cache.to_result(&entry);
        assert!(result.from_cache);
        assert_eq!(result.decision, ExpenseNature::Fixed);
        assert_eq!(result.final_score, 0.95);
        assert_eq!(result.contributing_factors.len(), 1);
        assert_eq!(
            result.contributing_factors[0].signal,
            SignalKind::KnowledgeCache
        );
    }
}
