//! Inference over the latest feature row per symbol: per-model predictions,
//! the heuristic ensemble, and signal emission.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use quantlab::clamp01;
use quantlab::ensemble::{ensemble_direction, ensemble_score, Components};
use quantlab::features::feature_vector;
use quantlab::models::{
    GradientBoostedTrees, LogisticRegression, MODEL_KEY_ENSEMBLE_V1, MODEL_KEY_LOGREG,
    MODEL_KEY_XGBOOST,
};
use serde_json::json;
use shared::domain::{
    indicator, is_classic_indicator, MlFeatureRow, MlPrediction, RiskLevel, Signal,
    SignalDirection, SignalFilter,
};
use std::sync::Arc;
use tracing::warn;

use crate::repositories::{FeatureStore, ModelStore, PredictionStore, SignalStore};

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub interval: String,
    pub target_hours: i64,
    pub long_threshold: f64,
    pub short_threshold: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        InferenceConfig {
            interval: "1h".to_string(),
            target_hours: 4,
            long_threshold: 0.55,
            short_threshold: 0.45,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunResult {
    pub predictions: usize,
    pub signals: usize,
}

enum ActivePredictor {
    LogReg(LogisticRegression),
    Boosted(GradientBoostedTrees),
}

impl ActivePredictor {
    fn predict_prob(&self, features: &[f64]) -> f64 {
        match self {
            ActivePredictor::LogReg(model) => model.predict_prob(features),
            ActivePredictor::Boosted(model) => model.predict_prob(features),
        }
    }
}

pub struct InferenceService {
    features: Arc<dyn FeatureStore>,
    registry: Arc<dyn ModelStore>,
    predictions: Arc<dyn PredictionStore>,
    signals: Arc<dyn SignalStore>,
    cfg: InferenceConfig,
}

impl InferenceService {
    pub fn new(
        features: Arc<dyn FeatureStore>,
        registry: Arc<dyn ModelStore>,
        predictions: Arc<dyn PredictionStore>,
        signals: Arc<dyn SignalStore>,
        mut cfg: InferenceConfig,
    ) -> Self {
        let defaults = InferenceConfig::default();
        if cfg.interval.is_empty() {
            cfg.interval = defaults.interval;
        }
        if cfg.target_hours <= 0 {
            cfg.target_hours = defaults.target_hours;
        }
        if cfg.long_threshold <= 0.0 || cfg.long_threshold >= 1.0 {
            cfg.long_threshold = defaults.long_threshold;
        }
        if cfg.short_threshold <= 0.0 || cfg.short_threshold >= 1.0 {
            cfg.short_threshold = defaults.short_threshold;
        }
        InferenceService {
            features,
            registry,
            predictions,
            signals,
            cfg,
        }
    }

    /// One inference cycle over the latest feature row per symbol. Returns
    /// a zero result when no model is active yet.
    pub async fn run_latest(&self) -> Result<RunResult> {
        let logreg = self.load_logreg().await?;
        let boosted = self.load_boosted().await?;
        if logreg.is_none() && boosted.is_none() {
            return Ok(RunResult::default());
        }

        let rows = self
            .features
            .list_latest_by_interval(&self.cfg.interval)
            .await?;

        let mut result = RunResult::default();
        for row in rows {
            let target_time = row.open_time + Duration::hours(self.cfg.target_hours);
            let features = feature_vector(&row);

            let classic_score = self.classic_score(&row).await;
            let mut log_prob = 0.5;
            let mut xgb_prob = 0.5;

            if let Some((version, model)) = &logreg {
                log_prob = clamp01(model.predict_prob(&features));
                self.persist_model_prediction(
                    &row,
                    MODEL_KEY_LOGREG,
                    *version,
                    log_prob,
                    target_time,
                    0.0,
                    &mut result,
                )
                .await?;
            }

            if let Some((version, model)) = &boosted {
                xgb_prob = clamp01(model.predict_prob(&features));
                self.persist_model_prediction(
                    &row,
                    MODEL_KEY_XGBOOST,
                    *version,
                    xgb_prob,
                    target_time,
                    0.0,
                    &mut result,
                )
                .await?;
            }

            let score = ensemble_score(Components {
                classic_score,
                logreg_prob: log_prob,
                xgboost_prob: xgb_prob,
            })
            .clamp(-1.0, 1.0);
            let ensemble_prob = clamp01((score + 1.0) / 2.0);
            let version = logreg
                .as_ref()
                .map(|(v, _)| *v)
                .unwrap_or(0)
                .max(boosted.as_ref().map(|(v, _)| *v).unwrap_or(0))
                .max(1);
            self.persist_model_prediction(
                &row,
                MODEL_KEY_ENSEMBLE_V1,
                version,
                ensemble_prob,
                target_time,
                score,
                &mut result,
            )
            .await?;
        }
        Ok(result)
    }

    async fn load_logreg(&self) -> Result<Option<(i32, ActivePredictor)>> {
        let Some(active) = self.registry.get_active_model(MODEL_KEY_LOGREG).await? else {
            return Ok(None);
        };
        if !feature_spec_matches(&active.model_key, &active.feature_spec_version) {
            return Ok(None);
        }
        let model = LogisticRegression::from_bytes(&active.artifact_blob)
            .context("decode logreg artifact")?;
        Ok(Some((active.version, ActivePredictor::LogReg(model))))
    }

    async fn load_boosted(&self) -> Result<Option<(i32, ActivePredictor)>> {
        let Some(active) = self.registry.get_active_model(MODEL_KEY_XGBOOST).await? else {
            return Ok(None);
        };
        if !feature_spec_matches(&active.model_key, &active.feature_spec_version) {
            return Ok(None);
        }
        let model = GradientBoostedTrees::from_bytes(&active.artifact_blob)
            .context("decode gbtree artifact")?;
        Ok(Some((active.version, ActivePredictor::Boosted(model))))
    }

    /// Weighted average of same-timestamp classical signals for the row's
    /// symbol/interval; low-risk signals weigh more ((6 - risk) / 5).
    async fn classic_score(&self, row: &MlFeatureRow) -> f64 {
        let signals = match self
            .signals
            .list_signals(&SignalFilter {
                symbol: row.symbol.clone(),
                limit: 100,
                ..Default::default()
            })
            .await
        {
            Ok(signals) => signals,
            Err(err) => {
                warn!("classic score lookup failed for {}: {:#}", row.symbol, err);
                return 0.0;
            }
        };

        let mut weighted = 0.0;
        let mut weight_total = 0.0;
        for signal in signals {
            if signal.interval != row.interval || signal.timestamp != row.open_time {
                continue;
            }
            if !is_classic_indicator(&signal.indicator) {
                continue;
            }
            let dir = match signal.direction {
                SignalDirection::Long => 1.0,
                SignalDirection::Short => -1.0,
                SignalDirection::Hold => 0.0,
            };
            let weight = ((6.0 - signal.risk as f64) / 5.0).max(0.0);
            weighted += dir * weight;
            weight_total += weight;
        }
        if weight_total == 0.0 {
            return 0.0;
        }
        (weighted / weight_total).clamp(-1.0, 1.0)
    }

    #[allow(clippy::too_many_arguments)]
    async fn persist_model_prediction(
        &self,
        row: &MlFeatureRow,
        model_key: &str,
        model_version: i32,
        prob_up: f64,
        target_time: DateTime<Utc>,
        ensemble: f64,
        result: &mut RunResult,
    ) -> Result<()> {
        let confidence = (2.0 * prob_up - 1.0).abs();
        let direction = if model_key == MODEL_KEY_ENSEMBLE_V1 {
            ensemble_direction(ensemble)
        } else {
            self.direction_from_prob(prob_up)
        };
        let risk = risk_from_confidence(confidence);

        let prediction = self
            .predictions
            .upsert_prediction(MlPrediction {
                id: 0,
                symbol: row.symbol.clone(),
                interval: row.interval.clone(),
                open_time: row.open_time,
                target_time,
                model_key: model_key.to_string(),
                model_version,
                prob_up,
                confidence,
                direction,
                risk,
                signal_id: None,
                details_json: self.details_json(model_key, model_version, prob_up, confidence, ensemble),
                created_at: Utc::now(),
                resolved_at: None,
                actual_up: None,
                is_correct: None,
                realized_return: None,
            })
            .await?;
        result.predictions += 1;

        if direction == SignalDirection::Hold {
            return Ok(());
        }

        let persisted = self
            .signals
            .insert_signals(&[Signal {
                id: 0,
                symbol: row.symbol.clone(),
                interval: row.interval.clone(),
                indicator: indicator_for_model_key(model_key).to_string(),
                timestamp: row.open_time,
                risk,
                direction,
                details: self.signal_details(model_key, model_version, prob_up, confidence, ensemble),
            }])
            .await?;
        if let Some(signal) = persisted.first().filter(|s| s.id > 0) {
            // A failed back-reference leaves a valid prediction without a
            // signal id.
            if let Err(err) = self
                .predictions
                .attach_signal_id(prediction.id, signal.id)
                .await
            {
                warn!(
                    "attach signal id {} to prediction {} failed: {:#}",
                    signal.id, prediction.id, err
                );
            }
        }
        result.signals += 1;
        Ok(())
    }

    fn direction_from_prob(&self, prob_up: f64) -> SignalDirection {
        if prob_up >= self.cfg.long_threshold {
            SignalDirection::Long
        } else if prob_up <= self.cfg.short_threshold {
            SignalDirection::Short
        } else {
            SignalDirection::Hold
        }
    }

    fn details_json(
        &self,
        model_key: &str,
        version: i32,
        prob_up: f64,
        confidence: f64,
        ensemble: f64,
    ) -> String {
        let mut payload = json!({
            "model_key": model_key,
            "model_version": version,
            "prob_up": round4(prob_up),
            "confidence": round4(confidence),
            "target": format!("{}h", self.cfg.target_hours),
        });
        if model_key == MODEL_KEY_ENSEMBLE_V1 {
            payload["ensemble_score"] = json!(round4(ensemble));
        }
        payload.to_string()
    }

    fn signal_details(
        &self,
        model_key: &str,
        version: i32,
        prob_up: f64,
        confidence: f64,
        ensemble: f64,
    ) -> String {
        let base = format!(
            "model_key={};model_version={};prob_up={:.4};confidence={:.4};target={}h",
            model_key, version, prob_up, confidence, self.cfg.target_hours
        );
        if model_key == MODEL_KEY_ENSEMBLE_V1 {
            format!("{};ensemble_score={:.4}", base, ensemble)
        } else {
            base
        }
    }
}

/// An active model trained against a different feature layout must not be
/// fed today's vectors.
fn feature_spec_matches(model_key: &str, spec_version: &str) -> bool {
    if spec_version == quantlab::features::FEATURE_SPEC_VERSION {
        return true;
    }
    warn!(
        "active model {} has feature spec {}, expected {}; skipping",
        model_key,
        spec_version,
        quantlab::features::FEATURE_SPEC_VERSION
    );
    false
}

/// Higher confidence maps to lower (more tradable) risk.
fn risk_from_confidence(confidence: f64) -> RiskLevel {
    if confidence >= 0.6 {
        2
    } else if confidence >= 0.4 {
        3
    } else if confidence >= 0.2 {
        4
    } else {
        5
    }
}

fn indicator_for_model_key(model_key: &str) -> &'static str {
    match model_key {
        MODEL_KEY_LOGREG => indicator::ML_LOGREG_UP4H,
        MODEL_KEY_XGBOOST => indicator::ML_XGBOOST_UP4H,
        _ => indicator::ML_ENSEMBLE_UP4H,
    }
}

fn round4(v: f64) -> f64 {
    if v.is_nan() || v.is_infinite() {
        return 0.0;
    }
    (v * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quantlab::features::FEATURE_NAMES;
    use quantlab::models::{gbtree, logreg};
    use shared::domain::MlModelVersion;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemRegistry {
        active: HashMap<String, MlModelVersion>,
    }

    #[async_trait]
    impl ModelStore for MemRegistry {
        async fn next_version(&self, _: &str) -> Result<i32> {
            Ok(1)
        }

        async fn insert_model_version(&self, model: MlModelVersion) -> Result<MlModelVersion> {
            Ok(model)
        }

        async fn get_active_model(&self, model_key: &str) -> Result<Option<MlModelVersion>> {
            Ok(self.active.get(model_key).cloned())
        }

        async fn get_latest_model(&self, model_key: &str) -> Result<Option<MlModelVersion>> {
            Ok(self.active.get(model_key).cloned())
        }

        async fn activate_model(&self, _: &str, _: i32) -> Result<()> {
            Ok(())
        }
    }

    struct MemFeatures {
        rows: Vec<MlFeatureRow>,
    }

    #[async_trait]
    impl FeatureStore for MemFeatures {
        async fn upsert_rows(&self, _: &[MlFeatureRow]) -> Result<()> {
            Ok(())
        }

        async fn list_labeled_rows(
            &self,
            _: &str,
            _: DateTime<Utc>,
            _: DateTime<Utc>,
        ) -> Result<Vec<MlFeatureRow>> {
            Ok(Vec::new())
        }

        async fn list_latest_by_interval(&self, _: &str) -> Result<Vec<MlFeatureRow>> {
            Ok(self.rows.clone())
        }
    }

    #[derive(Default)]
    struct MemPredictions {
        stored: Mutex<Vec<MlPrediction>>,
    }

    #[async_trait]
    impl PredictionStore for MemPredictions {
        async fn upsert_prediction(&self, mut prediction: MlPrediction) -> Result<MlPrediction> {
            let mut stored = self.stored.lock().unwrap();
            if let Some(existing) = stored.iter_mut().find(|p| {
                p.symbol == prediction.symbol
                    && p.interval == prediction.interval
                    && p.open_time == prediction.open_time
                    && p.model_key == prediction.model_key
                    && p.model_version == prediction.model_version
            }) {
                existing.prob_up = prediction.prob_up;
                existing.confidence = prediction.confidence;
                existing.direction = prediction.direction;
                existing.risk = prediction.risk;
                existing.details_json = prediction.details_json.clone();
                existing.target_time = prediction.target_time;
                return Ok(existing.clone());
            }
            prediction.id = stored.len() as i64 + 1;
            stored.push(prediction.clone());
            Ok(prediction)
        }

        async fn attach_signal_id(&self, prediction_id: i64, signal_id: i64) -> Result<()> {
            let mut stored = self.stored.lock().unwrap();
            let prediction = stored
                .iter_mut()
                .find(|p| p.id == prediction_id)
                .ok_or_else(|| anyhow::anyhow!("missing prediction"))?;
            prediction.signal_id = Some(signal_id);
            Ok(())
        }

        async fn list_unresolved_due(
            &self,
            _: DateTime<Utc>,
            _: u64,
        ) -> Result<Vec<MlPrediction>> {
            Ok(Vec::new())
        }

        async fn resolve_prediction(&self, _: i64, _: bool, _: bool, _: f64) -> Result<bool> {
            Ok(false)
        }
    }

    #[derive(Default)]
    struct MemSignals {
        stored: Mutex<Vec<Signal>>,
    }

    #[async_trait]
    impl SignalStore for MemSignals {
        async fn insert_signals(&self, signals: &[Signal]) -> Result<Vec<Signal>> {
            let mut stored = self.stored.lock().unwrap();
            let mut out = Vec::new();
            for signal in signals {
                let mut signal = signal.clone();
                signal.id = stored.len() as i64 + 1;
                stored.push(signal.clone());
                out.push(signal);
            }
            Ok(out)
        }

        async fn list_signals(&self, filter: &SignalFilter) -> Result<Vec<Signal>> {
            let stored = self.stored.lock().unwrap();
            Ok(stored
                .iter()
                .filter(|s| filter.symbol.is_empty() || s.symbol == filter.symbol)
                .cloned()
                .collect())
        }
    }

    fn feature_row() -> MlFeatureRow {
        MlFeatureRow {
            symbol: "BTC".to_string(),
            interval: "1h".to_string(),
            open_time: DateTime::<Utc>::from_timestamp(1_767_225_600, 0).unwrap(),
            ret_1h: 0.4,
            ret_4h: 0.3,
            ret_12h: 0.2,
            ret_24h: 0.1,
            volatility_6h: 0.01,
            volatility_24h: 0.02,
            volume_z_24h: 1.0,
            rsi_14: 70.0,
            macd_line: 0.4,
            macd_signal: 0.2,
            macd_hist: 0.2,
            bb_pos: 0.9,
            bb_width: 0.05,
            target_up_4h: None,
        }
    }

    fn trained_registry() -> MemRegistry {
        // A strongly separable toy set keyed on the first feature so the
        // models confidently predict "up" for the row above.
        let mut samples = Vec::new();
        let mut labels = Vec::new();
        for i in 0..160 {
            let up = i % 2 == 0;
            let base: f64 = if up { 0.35 } else { -0.35 };
            let jitter = ((i * 13) % 7) as f64 / 100.0;
            let mut sample = vec![0.0; FEATURE_NAMES.len()];
            sample[0] = base + jitter;
            sample[7] = 50.0 + base * 40.0;
            samples.push(sample);
            labels.push(if up { 1.0 } else { 0.0 });
        }
        let lr = LogisticRegression::train(
            &samples,
            &labels,
            &FEATURE_NAMES,
            logreg::TrainOptions::default(),
        )
        .unwrap();
        let gbt = GradientBoostedTrees::train(
            &samples,
            &labels,
            &FEATURE_NAMES,
            gbtree::TrainOptions::default(),
        )
        .unwrap();

        let version = |key: &str, blob: Vec<u8>| MlModelVersion {
            id: 1,
            model_key: key.to_string(),
            version: 3,
            feature_spec_version: "v1".to_string(),
            trained_from: Utc::now(),
            trained_to: Utc::now(),
            trained_at: Utc::now(),
            hyperparams_json: "{}".to_string(),
            metrics_json: "{}".to_string(),
            artifact_format: "json".to_string(),
            artifact_blob: blob,
            is_active: true,
            activated_at: None,
        };

        let mut active = HashMap::new();
        active.insert(
            MODEL_KEY_LOGREG.to_string(),
            version(MODEL_KEY_LOGREG, lr.to_bytes().unwrap()),
        );
        active.insert(
            MODEL_KEY_XGBOOST.to_string(),
            version(MODEL_KEY_XGBOOST, gbt.to_bytes().unwrap()),
        );
        MemRegistry { active }
    }

    #[tokio::test]
    async fn test_run_latest_without_models_is_noop() {
        let service = InferenceService::new(
            Arc::new(MemFeatures {
                rows: vec![feature_row()],
            }),
            Arc::new(MemRegistry::default()),
            Arc::new(MemPredictions::default()),
            Arc::new(MemSignals::default()),
            InferenceConfig::default(),
        );
        assert_eq!(service.run_latest().await.unwrap(), RunResult::default());
    }

    #[tokio::test]
    async fn test_run_latest_persists_three_predictions() {
        let predictions = Arc::new(MemPredictions::default());
        let signals = Arc::new(MemSignals::default());
        let service = InferenceService::new(
            Arc::new(MemFeatures {
                rows: vec![feature_row()],
            }),
            Arc::new(trained_registry()),
            predictions.clone(),
            signals.clone(),
            InferenceConfig::default(),
        );

        let result = service.run_latest().await.unwrap();
        assert_eq!(result.predictions, 3);

        let stored = predictions.stored.lock().unwrap();
        let keys: Vec<&str> = stored.iter().map(|p| p.model_key.as_str()).collect();
        assert!(keys.contains(&MODEL_KEY_LOGREG));
        assert!(keys.contains(&MODEL_KEY_XGBOOST));
        assert!(keys.contains(&MODEL_KEY_ENSEMBLE_V1));

        for prediction in stored.iter() {
            assert!((0.0..=1.0).contains(&prediction.prob_up));
            assert!((prediction.confidence - (2.0 * prediction.prob_up - 1.0).abs()).abs() < 1e-9);
            if prediction.direction != SignalDirection::Hold {
                assert!(prediction.signal_id.is_some());
            }
            let ensemble = stored
                .iter()
                .find(|p| p.model_key == MODEL_KEY_ENSEMBLE_V1)
                .unwrap();
            assert_eq!(ensemble.model_version, 3);
        }

        let emitted = signals.stored.lock().unwrap();
        assert_eq!(result.signals, emitted.len());
        for signal in emitted.iter() {
            assert_ne!(signal.direction, SignalDirection::Hold);
        }
    }

    #[tokio::test]
    async fn test_run_latest_is_idempotent() {
        let predictions = Arc::new(MemPredictions::default());
        let service = InferenceService::new(
            Arc::new(MemFeatures {
                rows: vec![feature_row()],
            }),
            Arc::new(trained_registry()),
            predictions.clone(),
            Arc::new(MemSignals::default()),
            InferenceConfig::default(),
        );

        service.run_latest().await.unwrap();
        let first: Vec<i64> = predictions
            .stored
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        service.run_latest().await.unwrap();
        let second: Vec<i64> = predictions
            .stored
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(first, second, "re-running preserves prediction ids");
    }

    #[test]
    fn test_risk_bands() {
        assert_eq!(risk_from_confidence(0.9), 2);
        assert_eq!(risk_from_confidence(0.5), 3);
        assert_eq!(risk_from_confidence(0.3), 4);
        assert_eq!(risk_from_confidence(0.1), 5);
    }
}
