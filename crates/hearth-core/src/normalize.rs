//! Text normalization shared by import, categorization and rule learning
//!
//! Bank exports spell the same merchant many ways ("CAFÉ DÉPÔT #12",
//! "Cafe Depot"), so every comparison in Hearth goes through one of these
//! folds:
//!
//! - [`normalize_description`] - accent and case folding, whitespace collapsed
//! - [`normalize_text`] - the above plus punctuation folding
//! - [`derive_vendor`] - a short merchant key with noise and reference numbers removed
//! - [`extract_pattern`] - the learned-rule lookup key

use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Tokens that carry no merchant identity in card statements
pub const VENDOR_NOISE_TOKENS: &[&str] = &[
    "pos",
    "purchase",
    "debit",
    "credit",
    "auth",
    "interac",
    "transaction",
    "card",
    "payment",
];

/// Patterns too generic to learn a rule from
pub const LEARNING_STOPLIST: &[&str] = &[
    "shop",
    "store",
    "payment",
    "merci",
    "service",
    "purchase",
    "debit",
    "credit",
    "transaction",
    "interest",
];

/// Literal patterns that identify a merchant regardless of surrounding words
pub const LEARNING_SPECIAL_PATTERNS: &[&str] = &["apple.com/bill"];

/// Maximum words kept in a vendor-keyed pattern
pub const VENDOR_PATTERN_WORDS: usize = 4;

/// Maximum words kept in a description-keyed pattern
pub const DESCRIPTION_PATTERN_WORDS: usize = 3;

fn reference_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z]*\d+[a-z\d-]*$").expect("valid regex"))
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Accent-insensitive, case-insensitive form of a description
///
/// Applies NFKD decomposition, drops combining marks, lowercases and
/// collapses runs of whitespace.
pub fn normalize_description(value: &str) -> String {
    let folded: String = value
        .trim()
        .to_lowercase()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect();
    collapse_whitespace(&folded)
}

/// Punctuation-insensitive form of a description
///
/// Everything except word characters, whitespace and `/` becomes a space.
pub fn normalize_text(value: &str) -> String {
    let folded: String = normalize_description(value)
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '/' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    collapse_whitespace(&folded)
}

/// Uppercase display key used to group vendors ("  Café Dépôt!!!  " -> "CAFE DEPOT")
pub fn normalize_vendor_key(value: &str) -> String {
    let folded: String = value
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(|c| c.to_uppercase())
        .map(|c| {
            if c.is_ascii_uppercase() || c.is_ascii_digit() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    collapse_whitespace(&folded)
}

/// Derive a short vendor name from a raw description
///
/// Drops noise tokens, then strips trailing card/reference numbers one at a
/// time, keeping at most four tokens.
pub fn derive_vendor(description: &str) -> String {
    let normalized = normalize_text(description);
    let mut tokens: Vec<&str> = normalized
        .split_whitespace()
        .filter(|t| !VENDOR_NOISE_TOKENS.contains(t))
        .collect();

    while tokens
        .last()
        .is_some_and(|t| reference_token_re().is_match(t))
    {
        tokens.pop();
    }

    tokens
        .into_iter()
        .take(VENDOR_PATTERN_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reduce a vendor or description to a learned-rule pattern
///
/// Special literal patterns win outright. Otherwise the longest leading run
/// of up to `max_words` words that is not a stopword is returned, or an
/// empty string when every candidate is a stopword.
pub fn extract_pattern(value: &str, max_words: usize) -> String {
    let normalized = normalize_text(value);
    if normalized.is_empty() {
        return String::new();
    }

    // Punctuation folding would split "apple.com/bill", so look in the
    // accent-folded text as well.
    let unfolded = normalize_description(value);
    for special in LEARNING_SPECIAL_PATTERNS {
        if unfolded.contains(special) || normalized.contains(special) {
            return (*special).to_string();
        }
    }

    let words: Vec<&str> = normalized.split_whitespace().collect();
    let mut count = max_words.min(words.len());
    while count > 0 {
        let candidate = words[..count].join(" ");
        if !is_stopword(&candidate) {
            return candidate;
        }
        count -= 1;
    }
    String::new()
}

/// Whether a pattern is too generic to learn
pub fn is_stopword(pattern: &str) -> bool {
    LEARNING_STOPLIST.contains(&pattern)
}

/// Lowercased, whitespace-collapsed CSV header cell
pub fn normalize_header_name(value: &str) -> String {
    collapse_whitespace(&value.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_description_folds_accents() {
        assert_eq!(normalize_description("  Café   DÉPÔT "), "cafe depot");
        assert_eq!(normalize_description(""), "");
    }

    #[test]
    fn test_normalize_text_strips_punctuation() {
        assert_eq!(normalize_text("  Café,   Dépôt!!  "), "cafe depot");
        assert_eq!(normalize_text("APPLE.COM/BILL"), "apple com/bill");
    }

    #[test]
    fn test_normalize_vendor_key() {
        assert_eq!(normalize_vendor_key("  Café Dépôt!!!  "), "CAFE DEPOT");
    }

    #[test]
    fn test_derive_vendor_strips_noise_and_reference() {
        assert_eq!(derive_vendor("POS PURCHASE TIM HORTONS 88991"), "tim hortons");
        assert_eq!(derive_vendor("INTERAC PURCHASE METRO 123 AB12"), "metro");
        assert_eq!(derive_vendor("POS 12345"), "");
        assert_eq!(
            derive_vendor("Canadian Tire Store Laval Quebec"),
            "canadian tire store laval"
        );
    }

    #[test]
    fn test_extract_pattern_skips_stopwords() {
        assert_eq!(extract_pattern("Netflix.com Monthly Plan", 3), "netflix com monthly");
        assert_eq!(extract_pattern("Shop", 3), "");
        assert_eq!(extract_pattern("Payment", 2), "");
        assert_eq!(extract_pattern("Shop Metro", 1), "");
        assert_eq!(extract_pattern("", 3), "");
    }

    #[test]
    fn test_extract_pattern_special_literal() {
        assert_eq!(extract_pattern("APPLE.COM/BILL 866-712-7753", 4), "apple.com/bill");
    }

    #[test]
    fn test_normalize_header_name() {
        assert_eq!(normalize_header_name("  Transaction   DATE "), "transaction date");
    }
}
