//! LLM batch sentiment scorer over an OpenAI-compatible chat-completions
//! endpoint. The model must answer with a bare JSON array; fenced output is
//! tolerated and trimmed before parsing.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use shared::domain::MarketIntelItem;
use std::collections::HashSet;
use std::time::Duration;

use crate::services::market_intel::scorer::{
    normalize_label, trim_code_fence, BatchSentimentScorer, SentimentScore,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const SYSTEM_PROMPT: &str = "You score crypto sentiment. Return ONLY JSON array. Each object \
requires: id (int), score (-1..1), confidence (0..1), label (bullish|neutral|bearish), reason \
(short text). No markdown.";

pub struct OpenAiScorer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ScoredRow {
    id: i64,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    label: String,
    #[serde(default)]
    reason: String,
}

impl OpenAiScorer {
    /// Returns None when no API key is configured, which disables the LLM
    /// phase entirely.
    pub fn new(api_key: Option<&str>, model: &str) -> Result<Option<Self>> {
        let Some(api_key) = api_key.map(str::trim).filter(|k| !k.is_empty()) else {
            return Ok(None);
        };
        let model = if model.trim().is_empty() {
            "gpt-4o-mini"
        } else {
            model.trim()
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("build llm http client")?;
        Ok(Some(OpenAiScorer {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }))
    }
}

impl OpenAiScorer {
    fn model_tag(&self) -> String {
        format!("llm:{}", self.model)
    }
}

#[async_trait]
impl BatchSentimentScorer for OpenAiScorer {
    async fn score_batch(&self, items: &[MarketIntelItem]) -> Result<Vec<SentimentScore>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let mut prompt = String::from("Items:\n");
        for item in items {
            prompt.push_str(&format!(
                "id={}\ntitle={}\nexcerpt={}\n\n",
                item.id,
                item.title.trim(),
                item.excerpt.trim()
            ));
        }

        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt},
            ],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("llm scorer error {}: {}", status, text));
        }

        let completion: ChatCompletion = response.json().await.context("decode llm response")?;
        let raw = completion
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| anyhow!("empty scorer completion"))?;
        let cleaned = trim_code_fence(&raw);

        let parsed: Vec<ScoredRow> =
            serde_json::from_str(&cleaned).context("parse scorer json")?;

        let known_ids: HashSet<i64> = items.iter().map(|item| item.id).collect();
        let mut out: Vec<SentimentScore> = parsed
            .into_iter()
            .filter(|row| known_ids.contains(&row.id))
            .map(|row| SentimentScore {
                item_id: row.id,
                score: row.score.clamp(-1.0, 1.0),
                confidence: row.confidence.clamp(0.0, 1.0),
                label: normalize_label(&row.label),
                reason: row.reason.trim().to_string(),
                model: self.model_tag(),
            })
            .collect();
        out.sort_by_key(|row| row.item_id);
        Ok(out)
    }
}
