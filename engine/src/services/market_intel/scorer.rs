//! Two-phase sentiment scoring: a keyword heuristic baseline for every item
//! with an optional LLM override on top.

use anyhow::Result;
use async_trait::async_trait;
use shared::domain::MarketIntelItem;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

pub const HEURISTIC_MODEL: &str = "heuristic:v1";
pub const DEFAULT_BATCH_SIZE: usize = 24;

// The keyword lists are frozen for reproducibility; note the deliberate
// exchange-flow asymmetry (outflow bullish, inflow bearish).
const BULLISH: [&str; 10] = [
    "bull", "breakout", "surge", "rally", "adoption", "outflow", "growth", "buy", "uptrend",
    "recover",
];
const BEARISH: [&str; 11] = [
    "bear",
    "dump",
    "sell",
    "crash",
    "hack",
    "lawsuit",
    "ban",
    "inflow",
    "decline",
    "downtrend",
    "liquidation",
];

#[derive(Debug, Clone, PartialEq)]
pub struct SentimentScore {
    pub item_id: i64,
    pub score: f64,
    pub confidence: f64,
    pub label: String,
    pub model: String,
    pub reason: String,
}

/// Batch scorer backed by a language model; failures fall back to the
/// heuristic baseline for the affected batch.
#[async_trait]
pub trait BatchSentimentScorer: Send + Sync {
    async fn score_batch(&self, items: &[MarketIntelItem]) -> Result<Vec<SentimentScore>>;
}

pub struct Scorer {
    llm: Option<Arc<dyn BatchSentimentScorer>>,
    batch_size: usize,
}

impl Scorer {
    pub fn new(llm: Option<Arc<dyn BatchSentimentScorer>>, batch_size: usize) -> Self {
        Scorer {
            llm,
            batch_size: if batch_size == 0 {
                DEFAULT_BATCH_SIZE
            } else {
                batch_size
            },
        }
    }

    pub async fn score(&self, items: &[MarketIntelItem]) -> Vec<SentimentScore> {
        if items.is_empty() {
            return Vec::new();
        }

        let mut by_id: HashMap<i64, SentimentScore> = HashMap::with_capacity(items.len());
        for item in items {
            let (score, confidence, label, reason) = heuristic_sentiment(&item.title, &item.excerpt);
            by_id.insert(
                item.id,
                SentimentScore {
                    item_id: item.id,
                    score,
                    confidence,
                    label,
                    model: HEURISTIC_MODEL.to_string(),
                    reason,
                },
            );
        }

        if let Some(llm) = &self.llm {
            for batch in items.chunks(self.batch_size) {
                let scored = match llm.score_batch(batch).await {
                    Ok(scored) => scored,
                    Err(err) => {
                        warn!("llm batch scoring failed, keeping heuristic: {:#}", err);
                        continue;
                    }
                };
                for row in scored {
                    let Some(current) = by_id.get_mut(&row.item_id) else {
                        continue;
                    };
                    current.score = row.score.clamp(-1.0, 1.0);
                    current.confidence = row.confidence.clamp(0.0, 1.0);
                    current.label = normalize_label(&row.label);
                    current.reason = if row.reason.trim().is_empty() {
                        "llm".to_string()
                    } else {
                        row.reason.trim().to_string()
                    };
                    if !row.model.is_empty() {
                        current.model = row.model;
                    }
                }
            }
        }

        items
            .iter()
            .filter_map(|item| by_id.get(&item.id).cloned())
            .collect()
    }
}

/// Keyword-count heuristic over the lowercased title + excerpt.
pub fn heuristic_sentiment(title: &str, excerpt: &str) -> (f64, f64, String, String) {
    let text = format!("{} {}", title, excerpt).trim().to_lowercase();
    if text.is_empty() {
        return (0.0, 0.25, "neutral".to_string(), "empty-text".to_string());
    }

    let bull = count_matches(&text, &BULLISH);
    let bear = count_matches(&text, &BEARISH);

    let raw = (bull as f64 - bear as f64) / (bull as f64 + bear as f64 + 1.0);
    let score = raw.clamp(-1.0, 1.0);
    let confidence = (0.35 + 0.1 * (bull as i64 - bear as i64).abs() as f64).clamp(0.25, 0.70);

    let label = if score > 0.2 {
        "bullish"
    } else if score < -0.2 {
        "bearish"
    } else {
        "neutral"
    };
    let reason = format!("heuristic keywords bull={} bear={}", bull, bear);
    (score, confidence, label.to_string(), reason)
}

fn count_matches(text: &str, tokens: &[&str]) -> usize {
    tokens.iter().filter(|token| text.contains(*token)).count()
}

pub fn normalize_label(label: &str) -> String {
    match label.trim().to_lowercase().as_str() {
        "bull" | "bullish" | "positive" => "bullish".to_string(),
        "bear" | "bearish" | "negative" => "bearish".to_string(),
        _ => "neutral".to_string(),
    }
}

/// Strips a surrounding markdown code fence (with optional `json` tag) so
/// fenced model output still parses.
pub fn trim_code_fence(raw: &str) -> String {
    let mut v = raw.trim();
    if v.starts_with("```") {
        v = v.trim_start_matches("```").trim();
        if let Some(rest) = v.get(..4).filter(|p| p.eq_ignore_ascii_case("json")).and(v.get(4..)) {
            v = rest.trim();
        }
        v = v.trim_end_matches("```").trim();
    }
    v.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, title: &str, excerpt: &str) -> MarketIntelItem {
        MarketIntelItem {
            id,
            title: title.to_string(),
            excerpt: excerpt.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_heuristic_bullish_headline() {
        let (score, confidence, label, model_reason) =
            heuristic_sentiment("Bitcoin breakout", "bull trend");
        assert!(score > 0.2);
        assert_eq!(label, "bullish");
        assert!(confidence >= 0.25 && confidence <= 0.70);
        assert!(model_reason.contains("bull=2"));
    }

    #[test]
    fn test_heuristic_bearish_and_neutral() {
        let (score, _, label, _) = heuristic_sentiment("Exchange hack triggers dump", "sell-off");
        assert!(score < -0.2);
        assert_eq!(label, "bearish");

        let (score, confidence, label, reason) = heuristic_sentiment("", "");
        assert_eq!(score, 0.0);
        assert_eq!(confidence, 0.25);
        assert_eq!(label, "neutral");
        assert_eq!(reason, "empty-text");
    }

    #[test]
    fn test_heuristic_mixed_keywords_balance_out() {
        let (score, _, label, _) = heuristic_sentiment("bull vs bear", "");
        assert_eq!(score, 0.0);
        assert_eq!(label, "neutral");
    }

    #[tokio::test]
    async fn test_score_uses_heuristic_without_llm() {
        let scorer = Scorer::new(None, 0);
        let scored = scorer.score(&[item(7, "Bitcoin rally", "")]).await;
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].item_id, 7);
        assert_eq!(scored[0].model, HEURISTIC_MODEL);
        assert!(scored[0].score > 0.0);
    }

    struct FakeLlm {
        fail: bool,
    }

    #[async_trait]
    impl BatchSentimentScorer for FakeLlm {
        async fn score_batch(&self, items: &[MarketIntelItem]) -> Result<Vec<SentimentScore>> {
            if self.fail {
                return Err(anyhow::anyhow!("model unavailable"));
            }
            Ok(items
                .iter()
                .map(|item| SentimentScore {
                    item_id: item.id,
                    score: 2.5, // deliberately out of range, must be clamped
                    confidence: 0.9,
                    label: "BULL".to_string(),
                    model: "llm:fake".to_string(),
                    reason: "  strong momentum  ".to_string(),
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_score_llm_override_clamps_and_normalizes() {
        let scorer = Scorer::new(Some(Arc::new(FakeLlm { fail: false })), 2);
        let scored = scorer
            .score(&[item(1, "whatever", ""), item(2, "crash", "")])
            .await;
        assert_eq!(scored.len(), 2);
        for row in &scored {
            assert_eq!(row.score, 1.0);
            assert_eq!(row.confidence, 0.9);
            assert_eq!(row.label, "bullish");
            assert_eq!(row.model, "llm:fake");
            assert_eq!(row.reason, "strong momentum");
        }
    }

    #[tokio::test]
    async fn test_score_llm_failure_keeps_heuristic() {
        let scorer = Scorer::new(Some(Arc::new(FakeLlm { fail: true })), 2);
        let scored = scorer.score(&[item(1, "Bitcoin breakout", "bull")]).await;
        assert_eq!(scored[0].model, HEURISTIC_MODEL);
        assert!(scored[0].score > 0.2);
    }

    #[test]
    fn test_trim_code_fence() {
        assert_eq!(trim_code_fence("```json\n[{\"id\":1}]\n```"), "[{\"id\":1}]");
        assert_eq!(trim_code_fence("```\n[]\n```"), "[]");
        assert_eq!(trim_code_fence("[]"), "[]");
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label(" Bullish "), "bullish");
        assert_eq!(normalize_label("negative"), "bearish");
        assert_eq!(normalize_label("whatever"), "neutral");
    }
}
