//! Headline canonicalization.
//!
//! Titles scraped from different outlets disagree on entities, casing,
//! punctuation and spacing. [`normalize`] maps them onto a comparable form and
//! [`tokenize`] derives the content-word set used by the Jaccard test.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static RE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Tokens must be longer than this to count as content words.
const MIN_TOKEN_CHARS: usize = 2;

/// Normalized text plus token set of a title. Pure function of the title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTitle {
    text: String,
    tokens: BTreeSet<String>,
}

impl NormalizedTitle {
    pub fn new(title: &str) -> Self {
        let text = normalize(title);
        let tokens = tokens_of(&text);
        Self { text, tokens }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &BTreeSet<String> {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Decode entities, lowercase, strip punctuation, collapse whitespace, trim.
///
/// Punctuation is removed before whitespace is collapsed so that
/// `"a & b"` becomes `"a b"` rather than `"a  b"`; this keeps the function
/// idempotent.
pub fn normalize(title: &str) -> String {
    let decoded = html_escape::decode_html_entities(title);
    let lowered = decoded.to_lowercase();
    let stripped = RE_PUNCT.replace_all(&lowered, "");
    let collapsed = RE_WS.replace_all(&stripped, " ");
    collapsed.trim().to_string()
}

/// Content words of a title: normalized, whitespace-split, longer than two
/// characters.
pub fn tokenize(title: &str) -> BTreeSet<String> {
    tokens_of(&normalize(title))
}

fn tokens_of(normalized: &str) -> BTreeSet<String> {
    normalized
        .split_whitespace()
        .filter(|w| w.chars().count() > MIN_TOKEN_CHARS)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_basic() {
        assert_eq!(
            normalize("  Cebu City Council   Approves NEW Budget!  "),
            "cebu city council approves new budget"
        );
    }

    #[test]
    fn test_normalize_decodes_entities() {
        assert_eq!(normalize("Rama&#8217;s &quot;plan&quot;"), "ramas plan");
        assert_eq!(normalize("Talisay &amp; Minglanilla"), "talisay minglanilla");
        assert_eq!(normalize("Bridge&nbsp;closed"), "bridge closed");
    }

    #[test]
    fn test_normalize_keeps_underscores_and_digits() {
        assert_eq!(normalize("P2.5-B road_project"), "p25b road_project");
    }

    #[test]
    fn test_normalize_garbage_is_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("!!! ??? ..."), "");
        assert_eq!(normalize("&amp;&lt;&gt;"), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let titles = [
            "Cebu City council approves new budget",
            "  LOOK: Osmeña &amp; Garcia — trade barbs   over P1-B deal ",
            "&amp;amp; double encoded &amp;lt;tag&amp;gt;",
            "Tabs\tand\nnewlines\r\nmixed",
            "a & b",
            "Ünïcödé Straße İstanbul",
            "",
        ];
        for t in titles {
            let once = normalize(t);
            assert_eq!(normalize(&once), once, "not idempotent for {t:?}");
        }
    }

    #[test]
    fn test_tokenize_drops_short_tokens() {
        let tokens = tokenize("LTO to fine 5 of the PUVs at SRP");
        let expected: BTreeSet<String> = ["lto", "fine", "the", "puvs", "srp"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn test_tokenize_is_a_set() {
        let tokens = tokenize("Flood flood FLOOD warning");
        assert_eq!(tokens.len(), 2);
        assert!(tokens.contains("flood"));
        assert!(tokens.contains("warning"));
    }

    #[test]
    fn test_normalized_title_matches_free_functions() {
        let t = "Mandaue &amp; Lapu-Lapu bridge reopens";
        let n = NormalizedTitle::new(t);
        assert_eq!(n.text(), normalize(t));
        assert_eq!(n.tokens(), &tokenize(t));
        assert!(!n.is_empty());
        assert!(NormalizedTitle::new("...").is_empty());
    }
}
