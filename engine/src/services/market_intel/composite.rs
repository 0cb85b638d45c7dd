//! Weighted fusion of per-source sentiment components into one directional
//! composite.

use serde_json::{json, Value};
use shared::domain::{RiskLevel, SignalDirection};

pub const MODEL_KEY_FUND_SENT_V1: &str = "fund_sent_v1";

/// One source's aggregate over the lookback window; unavailable components
/// are excluded and their weight redistributed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Component {
    pub score: f64,
    pub confidence: f64,
    pub available: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CompositeInput {
    pub interval: String,
    pub long_threshold: f64,
    pub short_threshold: f64,
    pub fear_greed_value: Option<i32>,
    pub fear_greed: Component,
    pub news: Component,
    pub reddit: Component,
    pub onchain: Component,
}

#[derive(Debug, Clone)]
pub struct CompositeResult {
    pub score: f64,
    pub confidence: f64,
    pub direction: SignalDirection,
    pub risk: RiskLevel,
    pub weights: Vec<(String, f64)>,
    pub details_text: String,
}

impl CompositeResult {
    pub fn weights_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (name, weight) in &self.weights {
            map.insert(name.clone(), json!(weight));
        }
        Value::Object(map)
    }
}

const BASE_WEIGHTS: [(&str, f64); 4] = [
    ("fear_greed", 0.20),
    ("news", 0.35),
    ("reddit", 0.25),
    ("onchain", 0.20),
];

/// Renormalizes the base weights over the available components, fuses score
/// and confidence, and maps conviction (|score| * confidence) to risk.
pub fn build_composite(input: &CompositeInput) -> CompositeResult {
    let components = [
        ("fear_greed", input.fear_greed),
        ("news", input.news),
        ("reddit", input.reddit),
        ("onchain", input.onchain),
    ];

    let active_weight: f64 = BASE_WEIGHTS
        .iter()
        .zip(components.iter())
        .filter(|(_, (_, c))| c.available)
        .map(|((_, w), _)| w)
        .sum();

    if active_weight <= 0.0 {
        return CompositeResult {
            score: 0.0,
            confidence: 0.0,
            direction: SignalDirection::Hold,
            risk: 5,
            weights: Vec::new(),
            details_text: format!(
                "model_key={};interval={};score=0.0000;confidence=0.0000;fng=na;news=na;onchain=na;reddit=na",
                MODEL_KEY_FUND_SENT_V1, input.interval
            ),
        };
    }

    let mut weights = Vec::new();
    let mut score = 0.0;
    let mut confidence = 0.0;
    for ((name, base), (_, component)) in BASE_WEIGHTS.iter().zip(components.iter()) {
        if !component.available {
            continue;
        }
        let weight = base / active_weight;
        weights.push((name.to_string(), weight));
        score += weight * clamp(component.score, -1.0, 1.0);
        confidence += weight * clamp(component.confidence, 0.0, 1.0);
    }
    score = clamp(score, -1.0, 1.0);
    confidence = clamp(confidence, 0.0, 1.0);

    let direction = if score >= input.long_threshold {
        SignalDirection::Long
    } else if score <= input.short_threshold {
        SignalDirection::Short
    } else {
        SignalDirection::Hold
    };

    let conviction = score.abs() * confidence;
    let risk: RiskLevel = if conviction >= 0.70 {
        2
    } else if conviction >= 0.50 {
        3
    } else if conviction >= 0.30 {
        4
    } else {
        5
    };

    CompositeResult {
        details_text: format_details(input, score, confidence),
        score,
        confidence,
        direction,
        risk,
        weights,
    }
}

fn format_details(input: &CompositeInput, score: f64, confidence: f64) -> String {
    let component_value = |c: &Component| {
        if c.available {
            format!("{:.4}", clamp(c.score, -1.0, 1.0))
        } else {
            "na".to_string()
        }
    };

    // The component fields (and the raw index value, when present) keep a
    // stable sorted order in the details text.
    let mut component_parts = vec![
        format!("fng={}", component_value(&input.fear_greed)),
        format!("news={}", component_value(&input.news)),
        format!("reddit={}", component_value(&input.reddit)),
        format!("onchain={}", component_value(&input.onchain)),
    ];
    if let Some(value) = input.fear_greed_value {
        component_parts.push(format!("fng_value={}", value));
    }
    component_parts.sort();

    let mut parts = vec![
        format!("model_key={}", MODEL_KEY_FUND_SENT_V1),
        format!("interval={}", input.interval),
        format!("score={:.4}", score),
        format!("confidence={:.4}", confidence),
    ];
    parts.extend(component_parts);
    parts.join(";")
}

fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    if v.is_nan() || v.is_infinite() {
        return 0.0;
    }
    v.clamp(lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn available(score: f64, confidence: f64) -> Component {
        Component {
            score,
            confidence,
            available: true,
        }
    }

    #[test]
    fn test_composite_all_components_long() {
        let result = build_composite(&CompositeInput {
            interval: "1h".to_string(),
            long_threshold: 0.20,
            short_threshold: -0.20,
            fear_greed: available(0.5, 0.7),
            news: available(0.8, 0.9),
            reddit: available(0.2, 0.6),
            onchain: available(0.4, 0.8),
            ..Default::default()
        });

        assert_eq!(result.direction, SignalDirection::Long);
        // score 0.51, confidence 0.765 -> conviction 0.39 lands in the
        // third band
        assert_eq!(result.risk, 4);
        let weights: std::collections::HashMap<_, _> = result.weights.iter().cloned().collect();
        assert!((weights["fear_greed"] - 0.20).abs() < 1e-9);
        assert!((weights["news"] - 0.35).abs() < 1e-9);
        assert!((weights["reddit"] - 0.25).abs() < 1e-9);
        assert!((weights["onchain"] - 0.20).abs() < 1e-9);
    }

    #[test]
    fn test_composite_renormalizes_over_available() {
        let result = build_composite(&CompositeInput {
            interval: "1h".to_string(),
            long_threshold: 0.20,
            short_threshold: -0.20,
            fear_greed: available(-0.3, 0.7),
            news: available(-0.6, 0.8),
            ..Default::default()
        });

        assert_eq!(result.direction, SignalDirection::Short);
        let total: f64 = result.weights.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(result.weights.len(), 2);
        for (name, _) in &result.weights {
            assert!(name == "fear_greed" || name == "news");
        }

        // fg 0.20/0.55, news 0.35/0.55
        let expected = (0.20 / 0.55) * -0.3 + (0.35 / 0.55) * -0.6;
        assert!((result.score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_composite_nothing_available_holds() {
        let result = build_composite(&CompositeInput {
            interval: "4h".to_string(),
            long_threshold: 0.20,
            short_threshold: -0.20,
            ..Default::default()
        });
        assert_eq!(result.score, 0.0);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.direction, SignalDirection::Hold);
        assert_eq!(result.risk, 5);
        assert!(result.weights.is_empty());
    }

    #[test]
    fn test_composite_conviction_risk_bands() {
        let result = build_composite(&CompositeInput {
            interval: "1h".to_string(),
            long_threshold: 0.20,
            short_threshold: -0.20,
            news: available(1.0, 1.0),
            ..Default::default()
        });
        assert_eq!(result.risk, 2);

        let weak = build_composite(&CompositeInput {
            interval: "1h".to_string(),
            long_threshold: 0.20,
            short_threshold: -0.20,
            news: available(0.1, 0.5),
            ..Default::default()
        });
        assert_eq!(weak.risk, 5);
    }

    #[test]
    fn test_composite_details_text() {
        let result = build_composite(&CompositeInput {
            interval: "1h".to_string(),
            long_threshold: 0.20,
            short_threshold: -0.20,
            fear_greed_value: Some(72),
            fear_greed: available(0.44, 0.66),
            ..Default::default()
        });
        assert!(result.details_text.starts_with("model_key=fund_sent_v1;interval=1h;"));
        assert!(result.details_text.contains("fng=0.4400;fng_value=72;news=na"));
        assert!(result.details_text.ends_with("reddit=na"));
    }
}
