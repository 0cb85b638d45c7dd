//! Extraction of tracked symbols from item text and metadata.

use regex::Regex;
use serde_json::Value;
use shared::domain::{is_supported_symbol, SUPPORTED_SYMBOLS};
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$?[A-Za-z]{2,10}").expect("symbol token regex"))
}

const ALIASES: [(&str, &[&str]); 10] = [
    ("BTC", &["btc", "bitcoin", "xbt"]),
    ("ETH", &["eth", "ethereum"]),
    ("SOL", &["sol", "solana"]),
    ("XRP", &["xrp", "ripple", "xrpl"]),
    ("ADA", &["ada", "cardano"]),
    ("DOGE", &["doge", "dogecoin"]),
    ("DOT", &["dot", "polkadot"]),
    ("AVAX", &["avax", "avalanche"]),
    ("LINK", &["link", "chainlink"]),
    ("MATIC", &["matic", "polygon"]),
];

fn subreddit_hint(subreddit: &str) -> Option<&'static str> {
    match subreddit.trim().to_lowercase().as_str() {
        "bitcoin" => Some("BTC"),
        "ethereum" => Some("ETH"),
        "cardano" => Some("ADA"),
        "ripple" | "xrpl" => Some("XRP"),
        _ => None,
    }
}

/// Produces the sorted unique set of in-universe symbols an item refers to.
/// Fear/greed items apply to the whole universe; otherwise ticker-like
/// tokens, name aliases, and (for reddit) the subreddit itself are matched.
pub fn extract_symbols(source: &str, title: &str, excerpt: &str, metadata: &Value) -> Vec<String> {
    if source.trim().to_lowercase() == "fear_greed" {
        return SUPPORTED_SYMBOLS.iter().map(|s| s.to_string()).collect();
    }

    let text = format!("{} {}", title, excerpt).to_lowercase();
    let mut matched: BTreeSet<&str> = BTreeSet::new();

    for token in token_regex().find_iter(&text) {
        let candidate = token.as_str().trim_start_matches('$').to_uppercase();
        if is_supported_symbol(&candidate) {
            for symbol in SUPPORTED_SYMBOLS {
                if symbol == candidate {
                    matched.insert(symbol);
                }
            }
        }
    }

    for (symbol, aliases) in ALIASES {
        if aliases.iter().any(|alias| text.contains(alias)) {
            matched.insert(symbol);
        }
    }

    if source.trim().to_lowercase() == "reddit" {
        if let Some(subreddit) = metadata.get("subreddit").and_then(Value::as_str) {
            if let Some(symbol) = subreddit_hint(subreddit) {
                matched.insert(symbol);
            }
        }
    }

    matched.into_iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fear_greed_covers_universe() {
        let symbols = extract_symbols("fear_greed", "", "", &Value::Null);
        assert_eq!(symbols.len(), SUPPORTED_SYMBOLS.len());
    }

    #[test]
    fn test_ticker_and_alias_matching() {
        let symbols = extract_symbols(
            "news",
            "$BTC and Solana rip higher",
            "polygon upgrade ships",
            &Value::Null,
        );
        assert_eq!(symbols, vec!["BTC", "MATIC", "SOL"]);
    }

    #[test]
    fn test_out_of_universe_tokens_ignored(){
        let symbols = extract_symbols("news", "SHIB PEPE frenzy", "", &Value::Null);
        assert!(symbols.is_empty());
    }

    #[test]
    fn test_subreddit_hint_applies_to_reddit_only() {
        let meta = json!({"subreddit": "Ripple"});
        let from_reddit = extract_symbols("reddit", "price talk", "", &meta);
        assert_eq!(from_reddit, vec!["XRP"]);

        let from_news = extract_symbols("news", "price talk", "", &meta);
        assert!(from_news.is_empty());
    }

    #[test]
    fn test_extraction_is_idempotent_and_sorted() {
        let meta = json!({"subreddit": "Bitcoin"});
        let first = extract_symbols("reddit", "BTC btc $btc bitcoin", "xbt", &meta);
        let second = extract_symbols("reddit", "BTC btc $btc bitcoin", "xbt", &meta);
        assert_eq!(first, vec!["BTC"]);
        assert_eq!(first, second);

        for symbol in &first {
            assert!(is_supported_symbol(symbol));
        }
    }
}
