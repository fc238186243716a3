//! Classifier configuration
//!
//! Every weight, threshold, and vocabulary the pipeline uses lives here and is
//! passed explicitly into the classifier, so tests can run varied
//! configurations deterministically. There is no module-level mutable state.

use crate::models::ExpenseNature;

/// Fixed ensemble weights for the five signals
///
/// They sum to 1.0 so the final score stays in [-1, 1].
#[derive(Debug, Clone, Copy)]
pub struct SignalWeights {
    pub keyword: f64,
    pub merchant_pattern: f64,
    pub stability: f64,
    pub ngram: f64,
    pub frequency: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            keyword: 0.35,
            merchant_pattern: 0.20,
            stability: 0.20,
            ngram: 0.15,
            frequency: 0.10,
        }
    }
}

/// A weighted vocabulary term, matched whole-word against normalized labels
#[derive(Debug, Clone)]
pub struct WeightedTerm {
    pub term: &'static str,
    /// Match confidence in [0, 1]
    pub weight: f64,
}

/// A curated merchant pattern, more specific than a bare keyword
#[derive(Debug, Clone)]
pub struct MerchantPatternRule {
    /// Regex source, matched against the normalized merchant key
    pub pattern: &'static str,
    pub lean: ExpenseNature,
    /// Match confidence in [0, 1]; typically higher than keyword weights
    pub weight: f64,
}

/// One canonical recurrence period with its tolerance band (days)
#[derive(Debug, Clone, Copy)]
pub struct CanonicalPeriod {
    pub days: i64,
    pub tolerance: i64,
    /// Frequency sub-score awarded when the mode interval lands in the band
    pub score: f64,
    /// Regularity points for the 0-100 pattern score
    pub pattern_points: f64,
}

/// Full pipeline configuration
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub weights: SignalWeights,

    /// |score| above this is a high-confidence decision (and the only way
    /// to be classified Fixed)
    pub high_confidence_threshold: f64,
    /// |score| above this (but at most high) is a medium-confidence decision
    pub medium_confidence_threshold: f64,

    // Amount-stability curve (coefficient of variation of absolute amounts)
    /// cv at or below this scores 1.0
    pub stability_cv_floor: f64,
    /// cv at or above this scores 0.0; linear in between
    pub stability_cv_ceiling: f64,

    /// Canonical recurrence periods, most specific band first
    pub canonical_periods: Vec<CanonicalPeriod>,
    /// Share of intervals that must agree with the mode interval for the
    /// pattern detector to award regularity points
    pub regularity_consistency_threshold: f64,

    // Pattern-score components (0-100 total, clamped)
    /// Occurrence-count points: 2 -> [0], 3 -> [1], 4 -> [2], 5+ -> [3]
    pub occurrence_points: [f64; 4],
    /// cv at or below this earns full stability points
    pub pattern_cv_floor: f64,
    /// cv at or above this earns 0 stability points; linear taper between
    pub pattern_cv_ceiling: f64,
    pub pattern_stability_points: f64,
    /// Bonus when the label matches the fixed vocabulary
    pub pattern_keyword_bonus: f64,

    // Pattern action thresholds
    pub auto_convert_threshold: f64,
    pub suggest_threshold: f64,
    pub validate_threshold: f64,

    // Knowledge cache tuning
    /// Minimum usage_count before a cached entry answers on the fast path
    /// (user-verified entries bypass this gate)
    pub knowledge_min_usage: i64,
    /// Confidence bump applied when a user accepts a suggestion unchanged
    pub knowledge_accept_bump: f64,
    /// Confidence is never bumped past this
    pub knowledge_confidence_cap: f64,
    /// Confidence assigned when a user overrides a classification
    pub knowledge_override_confidence: f64,
    /// Confidence assigned when an entry is first created from a
    /// high-confidence ensemble decision
    pub knowledge_seed_confidence: f64,
    /// Days of inactivity after which an unused entry (usage_count == 0)
    /// is stale and excluded from the fast path
    pub knowledge_retention_days: i64,

    /// Normalizer fallback length when stripping leaves nothing
    pub fallback_key_chars: usize,

    // Vocabularies
    pub fixed_terms: Vec<WeightedTerm>,
    pub variable_terms: Vec<WeightedTerm>,
    /// Savings vocabulary; a match turns a pattern's conversion into a
    /// savings provision
    pub provision_terms: Vec<WeightedTerm>,
    pub merchant_patterns: Vec<MerchantPatternRule>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            weights: SignalWeights::default(),
            high_confidence_threshold: 0.6,
            medium_confidence_threshold: 0.3,
            stability_cv_floor: 0.05,
            stability_cv_ceiling: 0.50,
            canonical_periods: default_periods(),
            regularity_consistency_threshold: 0.7,
            occurrence_points: [10.0, 15.0, 20.0, 30.0],
            pattern_cv_floor: 0.02,
            pattern_cv_ceiling: 0.15,
            pattern_stability_points: 30.0,
            pattern_keyword_bonus: 20.0,
            auto_convert_threshold: 80.0,
            suggest_threshold: 70.0,
            validate_threshold: 50.0,
            knowledge_min_usage: 3,
            knowledge_accept_bump: 0.05,
            knowledge_confidence_cap: 0.99,
            knowledge_override_confidence: 0.95,
            knowledge_seed_confidence: 0.70,
            knowledge_retention_days: 180,
            fallback_key_chars: 20,
            fixed_terms: default_fixed_terms(),
            variable_terms: default_variable_terms(),
            provision_terms: default_provision_terms(),
            merchant_patterns: default_merchant_patterns(),
        }
    }
}

fn default_periods() -> Vec<CanonicalPeriod> {
    vec![
        // Monthly first: the 28-31 day band is the strongest recurrence
        // signal in consumer banking and wins ties against wider bands
        CanonicalPeriod {
            days: 30,
            tolerance: 3,
            score: 1.0,
            pattern_points: 25.0,
        },
        CanonicalPeriod {
            days: 7,
            tolerance: 1,
            score: 0.9,
            pattern_points: 15.0,
        },
        CanonicalPeriod {
            days: 14,
            tolerance: 2,
            score: 0.85,
            pattern_points: 12.0,
        },
        CanonicalPeriod {
            days: 90,
            tolerance: 7,
            score: 0.8,
            pattern_points: 15.0,
        },
        CanonicalPeriod {
            days: 365,
            tolerance: 15,
            score: 0.8,
            pattern_points: 15.0,
        },
    ]
}

/// Subscription/utility/housing vocabulary (French bank labels plus the
/// common international brands)
fn default_fixed_terms() -> Vec<WeightedTerm> {
    [
        ("ABONNEMENT", 0.90),
        ("SUBSCRIPTION", 0.90),
        ("LOYER", 0.95),
        ("RENT", 0.90),
        ("ASSURANCE", 0.90),
        ("INSURANCE", 0.90),
        ("MUTUELLE", 0.90),
        ("FACTURE", 0.60),
        ("FORFAIT", 0.80),
        ("MENSUALITE", 0.85),
        ("PRELEVEMENT", 0.55),
        ("ELECTRICITE", 0.85),
        ("ENERGIE", 0.80),
        ("INTERNET", 0.75),
        ("TELECOM", 0.80),
        ("EDF", 1.00),
        ("ENGIE", 1.00),
        ("GDF", 0.95),
        ("VEOLIA", 0.90),
        ("ORANGE", 0.80),
        ("SFR", 0.85),
        ("BOUYGUES", 0.85),
        ("FREE", 0.80),
        ("NETFLIX", 0.95),
        ("SPOTIFY", 0.95),
        ("DEEZER", 0.95),
        ("CANAL", 0.85),
        ("SALLE DE SPORT", 0.85),
        ("GYM", 0.75),
        ("FITNESS", 0.75),
    ]
    .into_iter()
    .map(|(term, weight)| WeightedTerm { term, weight })
    .collect()
}

/// Day-to-day spending vocabulary
fn default_variable_terms() -> Vec<WeightedTerm> {
    [
        ("RESTAURANT", 0.90),
        ("BISTROT", 0.85),
        ("BRASSERIE", 0.85),
        ("CAFE", 0.75),
        ("BAR", 0.65),
        ("BOULANGERIE", 0.85),
        ("SUPERMARCHE", 0.85),
        ("HYPERMARCHE", 0.85),
        ("COURSES", 0.75),
        ("CARREFOUR", 0.85),
        ("LECLERC", 0.85),
        ("AUCHAN", 0.85),
        ("INTERMARCHE", 0.85),
        ("MONOPRIX", 0.85),
        ("LIDL", 0.85),
        ("CARBURANT", 0.85),
        ("ESSENCE", 0.85),
        ("STATION", 0.65),
        ("TOTAL", 0.60),
        ("FUEL", 0.80),
        ("GROCERY", 0.85),
        ("PHARMACIE", 0.70),
        ("TABAC", 0.75),
        ("AMAZON", 0.60),
        ("FNAC", 0.70),
        ("UBER EATS", 0.85),
        ("DELIVEROO", 0.85),
        ("MCDONALDS", 0.85),
        ("KEBAB", 0.85),
        ("PIZZERIA", 0.85),
    ]
    .into_iter()
    .map(|(term, weight)| WeightedTerm { term, weight })
    .collect()
}

/// Savings-transfer vocabulary; matches flip a pattern conversion to
/// a provision entry
fn default_provision_terms() -> Vec<WeightedTerm> {
    [
        ("EPARGNE", 0.95),
        ("LIVRET", 0.95),
        ("LIVRET A", 0.95),
        ("LDD", 0.90),
        ("LDDS", 0.90),
        ("PEL", 0.90),
        ("PEA", 0.85),
        ("ASSURANCE VIE", 0.90),
        ("VIREMENT EPARGNE", 0.95),
        ("SAVINGS", 0.90),
    ]
    .into_iter()
    .map(|(term, weight)| WeightedTerm { term, weight })
    .collect()
}

/// Curated merchant patterns: multi-token sequences and brand variants,
/// more specific than single keywords and weighted accordingly
fn default_merchant_patterns() -> Vec<MerchantPatternRule> {
    use ExpenseNature::{Fixed, Variable};
    vec![
        MerchantPatternRule {
            pattern: r"\bNETFLIX(\s+COM)?\b",
            lean: Fixed,
            weight: 0.95,
        },
        MerchantPatternRule {
            pattern: r"\bSPOTIFY\b",
            lean: Fixed,
            weight: 0.95,
        },
        MerchantPatternRule {
            pattern: r"\bAMAZON\s+PRIME\b",
            lean: Fixed,
            weight: 0.90,
        },
        MerchantPatternRule {
            pattern: r"\bEDF\b",
            lean: Fixed,
            weight: 0.95,
        },
        MerchantPatternRule {
            pattern: r"\bENGIE\b",
            lean: Fixed,
            weight: 0.95,
        },
        MerchantPatternRule {
            pattern: r"\b(SFR|BOUYGUES|FREE)\s+(MOBILE|TELECOM|BOX)\b",
            lean: Fixed,
            weight: 0.95,
        },
        MerchantPatternRule {
            pattern: r"\bORANGE\s+(FRANCE|SA|FACTURE)\b",
            lean: Fixed,
            weight: 0.90,
        },
        MerchantPatternRule {
            pattern: r"\b(LOYER|FONCIA|NEXITY|ORPI)\b",
            lean: Fixed,
            weight: 0.95,
        },
        MerchantPatternRule {
            pattern: r"\b(MAIF|MACIF|MATMUT|GMF|AXA|ALLIANZ)\b",
            lean: Fixed,
            weight: 0.95,
        },
        MerchantPatternRule {
            pattern: r"\bBASIC\s+FIT\b",
            lean: Fixed,
            weight: 0.90,
        },
        MerchantPatternRule {
            pattern: r"\b(RESTAURANT|BISTROT|BRASSERIE|PIZZERIA)\b",
            lean: Variable,
            weight: 0.85,
        },
        MerchantPatternRule {
            pattern: r"\b(CARREFOUR|LECLERC|AUCHAN|INTERMARCHE|MONOPRIX|LIDL|ALDI)\b",
            lean: Variable,
            weight: 0.90,
        },
        MerchantPatternRule {
            pattern: r"\b(UBER\s+EATS|DELIVEROO|JUST\s+EAT)\b",
            lean: Variable,
            weight: 0.90,
        },
        MerchantPatternRule {
            pattern: r"\bTOTAL(ENERGIES)?\s+(STATION|RELAIS)\b",
            lean: Variable,
            weight: 0.90,
        },
        MerchantPatternRule {
            pattern: r"\bSNCF\s+(BILLET|TGV)\b",
            lean: Variable,
            weight: 0.85,
        },
    ]
}
