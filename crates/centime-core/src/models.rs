//! Domain models for Centime

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A financial transaction entering classification
///
/// Owned by the surrounding application (CRUD, import and dedup happen there);
/// the core only reads it. Zero-amount transactions are filtered upstream and
/// rejected here if they slip through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub account_id: i64,
    pub date: NaiveDate,
    /// Raw bank label, e.g. "CB NETFLIX.COM 12/03 REF 884210"
    pub raw_label: String,
    /// Negative = outflow, positive = inflow/refund
    pub amount: f64,
}

/// Expense nature assigned to a transaction or merchant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseNature {
    /// Recurring charge with a stable amount (rent, subscription, utility)
    Fixed,
    /// Irregular day-to-day spending (groceries, restaurants, fuel)
    Variable,
    /// Recurring transfer toward savings; only produced by the pattern
    /// detector's savings vocabulary or by a user override, never by the
    /// ensemble decision itself
    Provision,
}

impl ExpenseNature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Variable => "variable",
            Self::Provision => "provision",
        }
    }
}

impl std::str::FromStr for ExpenseNature {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "variable" => Ok(Self::Variable),
            "provision" => Ok(Self::Provision),
            _ => Err(format!("Unknown expense nature: {}", s)),
        }
    }
}

impl std::fmt::Display for ExpenseNature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How sure the ensemble is about a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    /// |score| > 0.6
    High,
    /// 0.3 < |score| <= 0.6
    Medium,
    /// |score| <= 0.3
    Low,
}

impl ConfidenceBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for ConfidenceBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The independent signals feeding the ensemble
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Keyword,
    MerchantPattern,
    Stability,
    Frequency,
    Ngram,
    /// Synthetic signal used when a cached knowledge entry short-circuits
    /// the full ensemble
    KnowledgeCache,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::MerchantPattern => "merchant_pattern",
            Self::Stability => "stability",
            Self::Frequency => "frequency",
            Self::Ngram => "ngram",
            Self::KnowledgeCache => "knowledge_cache",
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw sub-scores produced by the five signal extractors
///
/// `keyword`, `merchant_pattern` and `ngram` are signed in [-1, 1]
/// (positive = fixed-leaning). `stability` and `frequency` are unsigned
/// in [0, 1].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SignalScores {
    pub keyword: f64,
    pub merchant_pattern: f64,
    pub stability: f64,
    pub frequency: f64,
    pub ngram: f64,
}

/// One weighted contribution to an ensemble score, for explainability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributingFactor {
    pub signal: SignalKind,
    /// Weighted contribution; all factors sum (approximately) to final_score
    pub contribution: f64,
    pub reason: String,
}

/// Result of classifying one transaction or merchant group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleResult {
    pub merchant_key: String,
    /// Combined weighted score, bounded to [-1, 1]
    pub final_score: f64,
    /// Binary decision; ambiguous scores default to Variable
    pub decision: ExpenseNature,
    pub confidence_band: ConfidenceBand,
    /// Ranked by |contribution| descending; never empty
    pub contributing_factors: Vec<ContributingFactor>,
    /// True when a knowledge-cache entry answered without running the ensemble
    pub from_cache: bool,
}

/// Per-transaction outcome of a batch classification
///
/// A single transaction's scoring failure never aborts the batch; it is
/// recorded as a `Failed` placeholder and the batch continues.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ClassificationOutcome {
    Classified {
        transaction_id: i64,
        result: EnsembleResult,
    },
    Failed {
        transaction_id: i64,
        error: String,
    },
}

impl ClassificationOutcome {
    pub fn transaction_id(&self) -> i64 {
        match self {
            Self::Classified { transaction_id, .. } => *transaction_id,
            Self::Failed { transaction_id, .. } => *transaction_id,
        }
    }

    pub fn result(&self) -> Option<&EnsembleResult> {
        match self {
            Self::Classified { result, .. } => Some(result),
            Self::Failed { .. } => None,
        }
    }
}

/// Action derived from a recurring pattern's score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternAction {
    /// Score >= 80: the caller may create the recurring entry automatically
    AutoConvert,
    /// Score 70-79: surface with one-click accept
    Suggest,
    /// Score 50-69: require explicit user confirmation
    Validate,
    /// Score < 50: no action, re-evaluated on the next batch
    Ignore,
}

impl PatternAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoConvert => "auto_convert",
            Self::Suggest => "suggest",
            Self::Validate => "validate",
            Self::Ignore => "ignore",
        }
    }
}

impl std::fmt::Display for PatternAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a recurring pattern should be converted into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionKind {
    /// Recurring charge -> automated fixed-expense entry
    FixedExpense,
    /// Recurring transfer matching the savings vocabulary -> provision entry
    SavingsProvision,
}

impl ConversionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FixedExpense => "fixed_expense",
            Self::SavingsProvision => "savings_provision",
        }
    }
}

/// A detected recurring pattern over one merchant key
///
/// Recomputed idempotently on every import batch. A new evaluation supersedes
/// the previous one; prior evaluations are never mutated in place, so the
/// caller can diff old against new before acting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringPattern {
    pub merchant_key: String,
    /// Transaction ids in date order
    pub occurrences: Vec<i64>,
    pub occurrence_count: usize,
    pub amount_mean: f64,
    pub amount_stddev: f64,
    pub interval_days_mean: f64,
    pub interval_days_stddev: f64,
    /// Confidence 0-100 that this group is a genuine recurring expense
    pub pattern_score: f64,
    pub suggested_action: PatternAction,
    pub conversion: ConversionKind,
    pub evaluated_at: DateTime<Utc>,
}

/// Learned classification for one merchant key
///
/// Owned exclusively by the knowledge cache; mutated only through the
/// learning paths (acceptance bump, user override). Never hard-deleted:
/// unused entries go stale after the retention window and fall out of the
/// fast path, forcing re-evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEntry {
    pub merchant_key: String,
    pub learned_classification: ExpenseNature,
    /// 0.0-1.0, capped below 1.0 so no entry is ever beyond doubt
    pub confidence: f64,
    pub usage_count: i64,
    pub verified_by_user: bool,
    pub last_updated: DateTime<Utc>,
}

/// Observability counters for a classifier session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierStats {
    pub total_classified: u64,
    pub failed: u64,
    pub cache_hits: u64,
    pub fixed_decisions: u64,
    pub variable_decisions: u64,
    /// Mean |final_score| across successful classifications
    pub avg_confidence: f64,
}
