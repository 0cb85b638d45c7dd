//! Normalized shapes produced by the external fetchers, plus the shared
//! text/number hygiene helpers they all use.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Latest fear & greed index reading.
#[derive(Debug, Clone)]
pub struct FearGreedPoint {
    pub value: i32,
    pub classification: String,
    pub timestamp: DateTime<Utc>,
}

/// One normalized news/reddit item before persistence.
#[derive(Debug, Clone)]
pub struct ContentItem {
    pub source: String,
    pub source_item_id: String,
    pub title: String,
    pub url: String,
    pub excerpt: String,
    pub author: String,
    pub published_at: DateTime<Utc>,
    pub metadata: Value,
}

/// One on-chain activity reading normalized to a directional score.
#[derive(Debug, Clone)]
pub struct OnChainObservation {
    pub provider_key: String,
    pub symbol: String,
    pub interval: String,
    pub bucket_time: DateTime<Utc>,
    pub score: f64,
    pub confidence: f64,
    pub metrics: Value,
}

pub const MAX_TITLE_LEN: usize = 300;
pub const MAX_EXCERPT_LEN: usize = 420;
pub const MAX_AUTHOR_LEN: usize = 120;

/// Collapses all whitespace runs to single spaces and caps the length
/// (`0` means uncapped). The cap respects char boundaries.
pub fn sanitize_text(input: &str, max_len: usize) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    if max_len == 0 || collapsed.len() <= max_len {
        return collapsed;
    }
    let mut cut = max_len;
    while cut > 0 && !collapsed.is_char_boundary(cut) {
        cut -= 1;
    }
    collapsed[..cut].to_string()
}

/// Drops everything between `<` and `>`.
pub fn html_strip(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut inside = false;
    for ch in input.chars() {
        match ch {
            '<' => inside = true,
            '>' => inside = false,
            _ if !inside => out.push(ch),
            _ => {}
        }
    }
    out
}

/// Permissive numeric coercion: remotes deliver numbers as floats, ints or
/// numeric strings interchangeably. Anything unparseable, NaN or infinite
/// coerces to 0.
pub fn as_float(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if parsed.is_finite() {
        parsed
    } else {
        0.0
    }
}

pub fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    if v.is_nan() || v.is_infinite() {
        return 0.0;
    }
    v.clamp(lo, hi)
}

/// Confidence grows with the magnitude of the normalized score.
pub fn confidence_from_score(score: f64) -> f64 {
    clamp(0.35 + 0.65 * score.abs(), 0.0, 1.0)
}
