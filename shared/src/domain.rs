//! Core domain types shared by the engine, repositories and quant code.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The fixed universe of tracked crypto symbols.
pub const SUPPORTED_SYMBOLS: [&str; 10] = [
    "BTC", "ETH", "SOL", "XRP", "ADA", "DOGE", "DOT", "AVAX", "LINK", "MATIC",
];

/// Candle intervals the system stores.
pub const SUPPORTED_INTERVALS: [&str; 5] = ["5m", "15m", "1h", "4h", "1d"];

/// Maps an internal symbol to its CoinGecko API identifier.
pub fn coingecko_id(symbol: &str) -> Option<&'static str> {
    match symbol {
        "BTC" => Some("bitcoin"),
        "ETH" => Some("ethereum"),
        "SOL" => Some("solana"),
        "XRP" => Some("ripple"),
        "ADA" => Some("cardano"),
        "DOGE" => Some("dogecoin"),
        "DOT" => Some("polkadot"),
        "AVAX" => Some("avalanche-2"),
        "LINK" => Some("chainlink"),
        "MATIC" => Some("matic-network"),
        _ => None,
    }
}

/// Reverse mapping from CoinGecko identifiers to internal symbols.
pub fn symbol_for_coingecko_id(id: &str) -> Option<&'static str> {
    match id {
        "bitcoin" => Some("BTC"),
        "ethereum" => Some("ETH"),
        "solana" => Some("SOL"),
        "ripple" => Some("XRP"),
        "cardano" => Some("ADA"),
        "dogecoin" => Some("DOGE"),
        "polkadot" => Some("DOT"),
        "avalanche-2" => Some("AVAX"),
        "chainlink" => Some("LINK"),
        "matic-network" => Some("MATIC"),
        _ => None,
    }
}

pub fn is_supported_symbol(symbol: &str) -> bool {
    coingecko_id(symbol).is_some()
}

/// Fixed duration of a candle interval; unknown intervals map to None.
pub fn interval_duration(interval: &str) -> Option<Duration> {
    match interval {
        "5m" => Some(Duration::minutes(5)),
        "15m" => Some(Duration::minutes(15)),
        "1h" => Some(Duration::hours(1)),
        "4h" => Some(Duration::hours(4)),
        "1d" => Some(Duration::days(1)),
        _ => None,
    }
}

/// A single OHLCV candle for a symbol at a given interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub interval: String,
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Latest price data for a symbol, cached in Redis under `price:<SYMBOL>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub symbol: String,
    pub price_usd: f64,
    pub volume_24h: f64,
    pub change_24h_pct: f64,
    pub last_updated_unix: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalDirection {
    Long,
    Short,
    Hold,
}

impl SignalDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalDirection::Long => "long",
            SignalDirection::Short => "short",
            SignalDirection::Hold => "hold",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "long" => SignalDirection::Long,
            "short" => SignalDirection::Short,
            _ => SignalDirection::Hold,
        }
    }
}

/// Risk scale: 1 is the most conservative signal, 5 the most speculative.
pub type RiskLevel = i16;

pub fn risk_is_valid(risk: RiskLevel) -> bool {
    (1..=5).contains(&risk)
}

pub mod indicator {
    pub const RSI: &str = "rsi";
    pub const MACD: &str = "macd";
    pub const BOLLINGER: &str = "bollinger";
    pub const VOLUME_Z: &str = "volume_zscore";
    pub const ML_LOGREG_UP4H: &str = "ml_logreg_up4h";
    pub const ML_XGBOOST_UP4H: &str = "ml_xgboost_up4h";
    pub const ML_ENSEMBLE_UP4H: &str = "ml_ensemble_up4h";
    pub const FUND_SENTIMENT_COMPOSITE: &str = "fund_sentiment_composite";
}

pub fn is_classic_indicator(name: &str) -> bool {
    matches!(
        name,
        indicator::RSI | indicator::MACD | indicator::BOLLINGER | indicator::VOLUME_Z
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: i64,
    pub symbol: String,
    pub interval: String,
    pub indicator: String,
    pub timestamp: DateTime<Utc>,
    pub risk: RiskLevel,
    pub direction: SignalDirection,
    pub details: String,
}

#[derive(Debug, Clone, Default)]
pub struct SignalFilter {
    pub symbol: String,
    pub indicator: String,
    pub risk: Option<RiskLevel>,
    pub limit: usize,
}

/// One feature row per (symbol, interval, open_time) candle, built from the
/// candle history alone; the label peeks at the candle `target_hours` ahead.
#[derive(Debug, Clone, PartialEq)]
pub struct MlFeatureRow {
    pub symbol: String,
    pub interval: String,
    pub open_time: DateTime<Utc>,
    pub ret_1h: f64,
    pub ret_4h: f64,
    pub ret_12h: f64,
    pub ret_24h: f64,
    pub volatility_6h: f64,
    pub volatility_24h: f64,
    pub volume_z_24h: f64,
    pub rsi_14: f64,
    pub macd_line: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
    pub bb_pos: f64,
    pub bb_width: f64,
    pub target_up_4h: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct MlModelVersion {
    pub id: i64,
    pub model_key: String,
    pub version: i32,
    pub feature_spec_version: String,
    pub trained_from: DateTime<Utc>,
    pub trained_to: DateTime<Utc>,
    pub trained_at: DateTime<Utc>,
    pub hyperparams_json: String,
    pub metrics_json: String,
    pub artifact_format: String,
    pub artifact_blob: Vec<u8>,
    pub is_active: bool,
    pub activated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct MlPrediction {
    pub id: i64,
    pub symbol: String,
    pub interval: String,
    pub open_time: DateTime<Utc>,
    pub target_time: DateTime<Utc>,
    pub model_key: String,
    pub model_version: i32,
    pub prob_up: f64,
    pub confidence: f64,
    pub direction: SignalDirection,
    pub risk: RiskLevel,
    pub signal_id: Option<i64>,
    pub details_json: String,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub actual_up: Option<bool>,
    pub is_correct: Option<bool>,
    pub realized_return: Option<f64>,
}

/// Raw ingested news/reddit/fear-greed item plus its sentiment, once scored.
#[derive(Debug, Clone)]
pub struct MarketIntelItem {
    pub id: i64,
    pub source: String,
    pub source_item_id: String,
    pub title: String,
    pub url: String,
    pub excerpt: String,
    pub author: String,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub metadata_json: String,
    pub sentiment_score: Option<f64>,
    pub sentiment_confidence: Option<f64>,
    pub sentiment_label: Option<String>,
    pub sentiment_model: Option<String>,
    pub sentiment_reason: Option<String>,
    pub scored_at: Option<DateTime<Utc>>,
    pub symbols: Vec<String>,
}

impl Default for MarketIntelItem {
    fn default() -> Self {
        MarketIntelItem {
            id: 0,
            source: String::new(),
            source_item_id: String::new(),
            title: String::new(),
            url: String::new(),
            excerpt: String::new(),
            author: String::new(),
            published_at: DateTime::<Utc>::UNIX_EPOCH,
            fetched_at: DateTime::<Utc>::UNIX_EPOCH,
            metadata_json: String::new(),
            sentiment_score: None,
            sentiment_confidence: None,
            sentiment_label: None,
            sentiment_model: None,
            sentiment_reason: None,
            scored_at: None,
            symbols: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarketOnChainSnapshot {
    pub symbol: String,
    pub interval: String,
    pub bucket_time: DateTime<Utc>,
    pub provider_key: String,
    pub onchain_score: f64,
    pub confidence: f64,
    pub details_json: String,
}

#[derive(Debug, Clone)]
pub struct MarketCompositeSnapshot {
    pub symbol: String,
    pub interval: String,
    pub open_time: DateTime<Utc>,
    pub fear_greed_value: Option<i32>,
    pub fear_greed_score: Option<f64>,
    pub news_score: Option<f64>,
    pub reddit_score: Option<f64>,
    pub onchain_score: Option<f64>,
    pub composite_score: f64,
    pub confidence: f64,
    pub direction: SignalDirection,
    pub risk: RiskLevel,
    pub component_weights_json: String,
    pub details_json: String,
    pub signal_id: Option<i64>,
}

/// Counters returned by one market-intel cycle; per-source failures land in
/// `errors` as warnings rather than aborting the cycle.
#[derive(Debug, Clone, Default)]
pub struct MarketIntelRunResult {
    pub items_ingested: usize,
    pub items_scored: usize,
    pub onchain_snapshots: usize,
    pub composites_written: usize,
    pub signals_written: usize,
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_mappings_round_trip() {
        for symbol in SUPPORTED_SYMBOLS {
            let id = coingecko_id(symbol).expect("every supported symbol has a coingecko id");
            assert_eq!(symbol_for_coingecko_id(id), Some(symbol));
        }
        assert_eq!(coingecko_id("SHIB"), None);
    }

    #[test]
    fn test_interval_durations() {
        assert_eq!(interval_duration("5m"), Some(Duration::minutes(5)));
        assert_eq!(interval_duration("1d"), Some(Duration::days(1)));
        assert_eq!(interval_duration("2h"), None);
    }

    #[test]
    fn test_price_snapshot_json_round_trip() {
        let snap = PriceSnapshot {
            symbol: "BTC".to_string(),
            price_usd: 97123.456789,
            volume_24h: 45_000_000_000.25,
            change_24h_pct: -2.3456,
            last_updated_unix: 1_767_225_600,
        };
        let encoded = serde_json::to_string(&snap).unwrap();
        let decoded: PriceSnapshot = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, snap);
    }

    #[test]
    fn test_direction_strings() {
        assert_eq!(SignalDirection::Long.as_str(), "long");
        assert_eq!(SignalDirection::parse("short"), SignalDirection::Short);
        assert_eq!(SignalDirection::parse("bogus"), SignalDirection::Hold);
    }
}
