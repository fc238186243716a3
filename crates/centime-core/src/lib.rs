//! Centime Core Library
//!
//! Deterministic, explainable expense-nature classification for personal
//! finance data:
//! - Bank label normalization into canonical merchant keys
//! - Five independent signal extractors (keyword, merchant pattern, amount
//!   stability, frequency, n-gram)
//! - Weighted ensemble scorer with per-signal contribution breakdowns
//! - Recurring-pattern detector with 0-100 scoring and action thresholds
//! - Knowledge cache that learns from user acceptances and overrides
//! - Pluggable storage (in-memory and SQLite adapters included)
//!
//! No network calls, no ML runtime; every decision is reproducible from the
//! inputs and explainable back to the user.

pub mod classify;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod knowledge;
pub mod models;
pub mod normalize;
pub mod patterns;
pub mod signals;
pub mod store;

pub use classify::Classifier;
pub use config::{
    CanonicalPeriod, ClassifierConfig, MerchantPatternRule, SignalWeights, WeightedTerm,
};
pub use error::{Error, Result};
pub use knowledge::KnowledgeCache;
pub use models::{
    ClassificationOutcome, ClassifierStats, ConfidenceBand, ContributingFactor, ConversionKind,
    EnsembleResult, ExpenseNature, KnowledgeEntry, PatternAction, RecurringPattern, SignalKind,
    SignalScores, Transaction,
};
pub use normalize::{LabelNormalizer, NormalizedLabel};
pub use store::{MemoryStore, Occurrence, SqliteStore, Storage, VerifiedLabel};
