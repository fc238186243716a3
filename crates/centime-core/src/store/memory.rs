//! In-memory storage adapter
//!
//! Backs unit and integration tests, and suits embedding callers that feed
//! history from their own structures per batch.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{ExpenseNature, KnowledgeEntry};
use crate::store::{Occurrence, Storage, VerifiedLabel};

#[derive(Debug, Default)]
struct Inner {
    history: HashMap<String, Vec<Occurrence>>,
    knowledge: HashMap<String, KnowledgeEntry>,
    corpus: Vec<VerifiedLabel>,
}

/// Everything behind one mutex; the pipeline is batch-oriented and
/// single-threaded per batch, so contention is not a concern here
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed one prior occurrence for a merchant key
    pub fn push_occurrence(&self, merchant_key: &str, date: NaiveDate, amount: f64) {
        let mut inner = self.lock();
        let history = inner.history.entry(merchant_key.to_string()).or_default();
        history.push(Occurrence { date, amount });
        history.sort_by(|a, b| a.date.cmp(&b.date));
    }

    /// Add a user-verified label to the corpus
    pub fn push_verified_label(&self, label: &str, classification: ExpenseNature) {
        self.lock().corpus.push(VerifiedLabel {
            label: label.to_string(),
            classification,
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Storage for MemoryStore {
    fn get_transaction_history(&self, merchant_key: &str) -> Result<Vec<Occurrence>> {
        Ok(self
            .lock()
            .history
            .get(merchant_key)
            .cloned()
            .unwrap_or_default())
    }

    fn get_knowledge_entry(&self, merchant_key: &str) -> Result<Option<KnowledgeEntry>> {
        Ok(self.lock().knowledge.get(merchant_key).cloned())
    }

    fn put_knowledge_entry(&self, entry: &KnowledgeEntry) -> Result<()> {
        self.lock()
            .knowledge
            .insert(entry.merchant_key.clone(), entry.clone());
        Ok(())
    }

    fn get_verified_corpus(&self) -> Result<Vec<VerifiedLabel>> {
        Ok(self.lock().corpus.clone())
    }
}
