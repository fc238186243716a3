//! Storage collaborator interface
//!
//! The classifier core owns no persistence. It consumes a narrow `Storage`
//! seam: per-merchant transaction history for the stability and frequency
//! signals, the knowledge-cache entries, and the user-verified label corpus
//! for the n-gram signal. Two adapters ship with the crate:
//!
//! - [`memory::MemoryStore`] - in-memory, for tests and embedding callers
//! - [`sqlite::SqliteStore`] - rusqlite-backed reference implementation
//!
//! Host applications with their own persistence implement the trait
//! directly. All methods are synchronous keyed lookups; callers may batch
//! (bulk-read relevant keys before scoring, bulk-write after).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{ExpenseNature, KnowledgeEntry};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// One prior occurrence of a merchant key
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Occurrence {
    pub date: NaiveDate,
    /// Signed; negative = outflow
    pub amount: f64,
}

/// A label whose classification a user has confirmed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedLabel {
    pub label: String,
    pub classification: ExpenseNature,
}

/// External storage collaborator
///
/// Implementations must keep per-merchant-key writes last-write-wins;
/// writers to different keys never conflict.
pub trait Storage {
    /// Prior occurrences of a merchant key, in date order
    fn get_transaction_history(&self, merchant_key: &str) -> Result<Vec<Occurrence>>;

    fn get_knowledge_entry(&self, merchant_key: &str) -> Result<Option<KnowledgeEntry>>;

    fn put_knowledge_entry(&self, entry: &KnowledgeEntry) -> Result<()>;

    /// User-verified labels for building the n-gram distributions; may be
    /// recomputed periodically rather than per classification
    fn get_verified_corpus(&self) -> Result<Vec<VerifiedLabel>>;
}
