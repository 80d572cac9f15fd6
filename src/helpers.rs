//! Shared text normalization and fingerprinting helpers.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

/// Normalize a string for fuzzy matching: NFKD fold, lowercase, ASCII
/// alphanumeric only.
pub fn normalize_key(value: &str) -> String {
    value
        .nfkd()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

fn stop_words() -> &'static BTreeSet<&'static str> {
    static WORDS: OnceLock<BTreeSet<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| {
        [
            "the", "and", "for", "with", "from", "this", "that", "are", "was", "has",
            "have", "will", "our", "your", "their", "all", "any", "per", "via", "inc",
            "llc", "ltd", "gmbh", "attached", "please", "regards", "thanks", "dear",
            "subject", "fwd", "fw", "re",
        ]
        .into_iter()
        .collect()
    })
}

/// Tokenize free text into normalized name tokens: NFKD fold, lowercase,
/// split on non-alphanumerics, drop stop words, pure numbers and tokens
/// under 3 chars, dedupe preserving first-seen order. Numbers travel as
/// amounts, dates or codes, never as name material.
pub fn name_tokens(text: &str) -> Vec<String> {
    let folded: String = text.nfkd().collect();
    let lower = folded.to_lowercase();
    let mut seen = BTreeSet::new();
    let mut tokens = Vec::new();
    for raw in lower.split(|c: char| !c.is_ascii_alphanumeric()) {
        if raw.len() < 3 || stop_words().contains(raw) {
            continue;
        }
        if raw.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if seen.insert(raw.to_string()) {
            tokens.push(raw.to_string());
        }
    }
    tokens
}

/// Deterministic fingerprint over the given parts, for dedup.
pub fn fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(parts.join("|").as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("23 BK-050"), "23bk050");
        assert_eq!(normalize_key("Café Olé"), "cafeole");
        assert_eq!(normalize_key(""), "");
    }

    #[test]
    fn test_name_tokens_drops_stop_words_and_shorts() {
        let tokens = name_tokens("Re: The Beach Club at Mandarin Oriental, Bali");
        assert_eq!(tokens, vec!["beach", "club", "mandarin", "oriental", "bali"]);
    }

    #[test]
    fn test_name_tokens_drops_pure_numbers() {
        let tokens = name_tokens("invoice 550,000 due 2026-03-01 for tower 23bk050");
        assert_eq!(tokens, vec!["invoice", "due", "tower", "23bk050"]);
    }

    #[test]
    fn test_name_tokens_dedupes() {
        let tokens = name_tokens("bali bali Bali");
        assert_eq!(tokens, vec!["bali"]);
    }

    #[test]
    fn test_fingerprint_stable_and_distinct() {
        let a = fingerprint(&["proj-1", "fee_mismatch", "500000"]);
        let b = fingerprint(&["proj-1", "fee_mismatch", "500000"]);
        let c = fingerprint(&["proj-1", "fee_mismatch", "548500"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
