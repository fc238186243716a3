//! Merchant-pattern signal
//!
//! A curated table of merchant-category regex patterns: multi-token
//! sequences and brand variants that are more specific than bare keywords,
//! so hits carry higher confidence weights. Ties between this signal and the
//! keyword signal are resolved by the ensemble's fixed weighting, not here.

use regex::Regex;

use crate::config::ClassifierConfig;
use crate::error::Result;
use crate::models::ExpenseNature;
use crate::signals::clamp_signed;

/// A merchant pattern compiled at classifier construction
#[derive(Debug)]
struct CompiledRule {
    regex: Regex,
    lean: ExpenseNature,
    weight: f64,
}

/// Merchant-pattern matcher with patterns compiled once
#[derive(Debug)]
pub struct MerchantMatcher {
    rules: Vec<CompiledRule>,
}

impl MerchantMatcher {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let rules = config
            .merchant_patterns
            .iter()
            .map(|rule| {
                Ok(CompiledRule {
                    regex: Regex::new(rule.pattern)?,
                    lean: rule.lean,
                    weight: rule.weight,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Score in [-1, 1]; positive = fixed-leaning. No pattern hit is 0.
    pub fn score(&self, merchant_key: &str) -> f64 {
        let mut best_fixed = 0.0_f64;
        let mut best_variable = 0.0_f64;
        for rule in &self.rules {
            if !rule.regex.is_match(merchant_key) {
                continue;
            }
            match rule.lean {
                ExpenseNature::Fixed | ExpenseNature::Provision => {
                    best_fixed = best_fixed.max(rule.weight);
                }
                ExpenseNature::Variable => {
                    best_variable = best_variable.max(rule.weight);
                }
            }
        }
        clamp_signed(best_fixed - best_variable)
    }
}
