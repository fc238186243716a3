//! Label normalization
//!
//! Bank labels carry transactional noise around the merchant name: payment
//! method markers ("CB", "PRLV SEPA"), date fragments, card and reference
//! numbers, store codes. Normalization strips that noise with an ordered set
//! of rules and produces a canonical merchant key used for grouping, signal
//! scoring, and the knowledge cache.
//!
//! Normalization is pure and idempotent: `normalize(normalize(x)) ==
//! normalize(x)`, and it never returns an empty key.

use regex::Regex;

use crate::config::ClassifierConfig;
use crate::error::Result;

/// Result of normalizing a raw bank label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedLabel {
    /// Canonical merchant key: uppercase, punctuation-free, noise-free
    pub key: String,
    /// City extracted from a trailing "<postal code> <CITY>" fragment, if any
    pub location: Option<String>,
}

/// Compiled normalization rules, built once per classifier
#[derive(Debug)]
pub struct LabelNormalizer {
    location: Regex,
    date_fragment: Regex,
    reference_token: Regex,
    digit_run: Regex,
    numeric_token: Regex,
    payment_marker: Regex,
    fallback_chars: usize,
}

impl LabelNormalizer {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        Ok(Self {
            // French labels put the city after a 5-digit postal code at the end
            location: Regex::new(r"\b\d{5}\s+([A-Z][A-Z ]{1,30})\s*$")?,
            date_fragment: Regex::new(r"\b\d{1,2}/\d{1,2}(/\d{2,4})?\b")?,
            reference_token: Regex::new(
                r"\b(REF|REFERENCE|TXN|TRX|AUT|AUTORISATION|FACT|NUM|ID)\s*:?\s*[A-Z0-9]*\d[A-Z0-9]*\b",
            )?,
            // Mixed tokens with a long digit run are card/transaction ids
            digit_run: Regex::new(r"\b[A-Z]*\d{4,}[A-Z0-9]*\b")?,
            numeric_token: Regex::new(r"\b\d+\b")?,
            payment_marker: Regex::new(
                r"^\s*(PAIEMENT\s+CB|PAIEMENT|ACHAT\s+CB|ACHAT|PRLV\s+SEPA|PRLV|VIR\s+SEPA|VIR|RETRAIT|CB|CARTE|TPE|POS|DEBIT|ACH)\b[\s*.]*",
            )?,
            fallback_chars: config.fallback_key_chars,
        })
    }

    /// Normalize a raw label into a canonical merchant key
    pub fn normalize(&self, raw_label: &str) -> NormalizedLabel {
        let upper = fold_diacritics(&raw_label.to_uppercase());

        let location = self
            .location
            .captures(&upper)
            .and_then(|c| c.get(1))
            .map(|m| collapse_whitespace(m.as_str()));

        // Rule order matters for idempotence: everything digit-bearing goes
        // first so a second pass sees no dates, references, or ids, then the
        // leading payment markers are peeled until a fixpoint.
        let mut text = self.date_fragment.replace_all(&upper, " ").into_owned();
        text = self.reference_token.replace_all(&text, " ").into_owned();
        text = self.digit_run.replace_all(&text, " ").into_owned();
        text = strip_punctuation(&text);
        text = self.numeric_token.replace_all(&text, " ").into_owned();
        loop {
            let stripped = self.payment_marker.replace(&text, "").into_owned();
            if stripped == text {
                break;
            }
            text = stripped;
        }

        let key = collapse_whitespace(&text);
        if key.is_empty() {
            return NormalizedLabel {
                key: self.fallback_key(raw_label),
                location,
            };
        }

        NormalizedLabel { key, location }
    }

    /// Fail-safe key when stripping leaves nothing: the first characters of
    /// the original label, uppercased. Whitespace is collapsed so the
    /// fallback is itself a fixpoint of `normalize`.
    fn fallback_key(&self, raw_label: &str) -> String {
        let collapsed = collapse_whitespace(&fold_diacritics(&raw_label.to_uppercase()));
        let truncated: String = collapsed.chars().take(self.fallback_chars).collect();
        if truncated.trim().is_empty() {
            // Entirely blank input still must never yield an empty key
            "UNKNOWN".to_string()
        } else {
            truncated.trim().to_string()
        }
    }
}

/// Fold accented characters to their ASCII base. Banks emit the same label
/// both accented and mangled-unaccented ("VIREMENT ÉPARGNE" vs "VIREMENT
/// EPARGNE"); the vocabularies are unaccented, so keys must be too.
fn fold_diacritics(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'À' | 'Â' | 'Ä' => 'A',
            'Ç' => 'C',
            'È' | 'É' | 'Ê' | 'Ë' => 'E',
            'Î' | 'Ï' => 'I',
            'Ô' | 'Ö' => 'O',
            'Ù' | 'Û' | 'Ü' => 'U',
            'Ÿ' => 'Y',
            other => other,
        })
        .collect()
}

/// Replace everything that is not alphanumeric with a space
fn strip_punctuation(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
